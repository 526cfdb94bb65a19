//! Validation helpers for DTOs.

use std::collections::BTreeMap;

use validator::ValidationError;

use crate::services::gift_rating_service::{MAX_RATING, MIN_RATING};

/// Rejects strings that are empty once trimmed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Every secret must carry some text.
pub fn validate_secrets(secrets: &[String]) -> Result<(), ValidationError> {
    if let Some(index) = secrets.iter().position(|secret| secret.trim().is_empty()) {
        let mut err = ValidationError::new("blank_secret");
        err.message = Some(format!("secret {} must not be blank", index + 1).into());
        return Err(err);
    }
    Ok(())
}

/// Gift ratings go from 1 to 5.
pub fn validate_ratings(ratings: &BTreeMap<String, u8>) -> Result<(), ValidationError> {
    if let Some((id, rating)) = ratings
        .iter()
        .find(|(_, rating)| !(MIN_RATING..=MAX_RATING).contains(*rating))
    {
        let mut err = ValidationError::new("rating_range");
        err.message = Some(
            format!("rating for {id} must be between {MIN_RATING} and {MAX_RATING} (got {rating})")
                .into(),
        );
        return Err(err);
    }
    Ok(())
}
