//! Trust score derivation. Pure and deterministic: the same three check
//! statuses always produce the same score.

use super::CheckStatus;

/// Start at 100, subtract per-check penalties, clamp to 0..=100.
pub fn compute_trust_score(
    integrity: CheckStatus,
    auth: CheckStatus,
    exposure: CheckStatus,
) -> i32 {
    let mut score = 100;

    score -= match integrity {
        CheckStatus::Critical => 50,
        CheckStatus::Warning => 15,
        _ => 0,
    };

    score -= match auth {
        CheckStatus::Critical => 35,
        CheckStatus::Warning => 15,
        _ => 0,
    };

    score -= match exposure {
        CheckStatus::Critical => 30,
        CheckStatus::Warning => 10,
        _ => 0,
    };

    score.clamp(0, 100)
}
