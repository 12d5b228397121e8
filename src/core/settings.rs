//! Recommendation settings - The singleton row holding mining thresholds.
//!
//! The row is created with defaults on first access. Each mining run loads it once and
//! passes the thresholds down as a plain [`MiningParams`] value, so nothing in the
//! pipeline reads configuration from ambient state.

use crate::{
    core::rules::MiningParams,
    entities::{RecommendationConfig, recommendation_config},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{Set, prelude::*};
use tracing::info;

/// Primary key of the singleton row.
pub const CONFIG_ID: i32 = 1;

/// Default number of recommendations returned to callers.
pub const DEFAULT_MAX_RECOMMENDATIONS: i32 = 5;

/// Default number of days between scheduled remines.
pub const DEFAULT_REFRESH_INTERVAL_DAYS: i32 = 7;

/// Partial update of the recommendation settings; `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfigUpdate {
    /// New minimum support, in (0, 1]
    pub min_support: Option<f64>,
    /// New minimum confidence, in [0, 1]
    pub min_confidence: Option<f64>,
    /// New minimum lift, ≥ 0
    pub min_lift: Option<f64>,
    /// New default result size, ≥ 1
    pub max_recommendations: Option<i32>,
    /// New remine interval in days, ≥ 0
    pub refresh_interval_days: Option<i32>,
}

impl From<&recommendation_config::Model> for MiningParams {
    fn from(config: &recommendation_config::Model) -> Self {
        Self {
            min_support: config.min_support,
            min_confidence: config.min_confidence,
            min_lift: config.min_lift,
        }
    }
}

fn default_config() -> recommendation_config::ActiveModel {
    let defaults = MiningParams::default();
    recommendation_config::ActiveModel {
        id: Set(CONFIG_ID),
        min_support: Set(defaults.min_support),
        min_confidence: Set(defaults.min_confidence),
        min_lift: Set(defaults.min_lift),
        max_recommendations: Set(DEFAULT_MAX_RECOMMENDATIONS),
        refresh_interval_days: Set(DEFAULT_REFRESH_INTERVAL_DAYS),
        last_run_at: Set(None),
    }
}

/// Returns the settings row, creating it with defaults if it does not exist yet.
///
/// # Errors
/// Returns an error if the database query or insert fails.
pub async fn get_or_create_config<C>(db: &C) -> Result<recommendation_config::Model>
where
    C: ConnectionTrait,
{
    if let Some(config) = RecommendationConfig::find_by_id(CONFIG_ID).one(db).await? {
        return Ok(config);
    }

    info!("No recommendation config found, creating defaults");
    default_config().insert(db).await.map_err(Into::into)
}

fn check_range(name: &str, value: f64, min: f64, max: f64, min_inclusive: bool) -> Result<()> {
    let above_min = if min_inclusive { value >= min } else { value > min };
    if value.is_finite() && above_min && value <= max {
        Ok(())
    } else {
        Err(Error::InvalidThreshold {
            name: name.to_string(),
            value,
        })
    }
}

/// Validates and applies a partial settings update.
///
/// # Errors
/// Returns `InvalidThreshold` if any provided value is out of range, or a database
/// error if the update fails. Nothing is written when validation fails.
pub async fn update_config<C>(db: &C, update: ConfigUpdate) -> Result<recommendation_config::Model>
where
    C: ConnectionTrait,
{
    if let Some(v) = update.min_support {
        check_range("min_support", v, 0.0, 1.0, false)?;
    }
    if let Some(v) = update.min_confidence {
        check_range("min_confidence", v, 0.0, 1.0, true)?;
    }
    if let Some(v) = update.min_lift {
        check_range("min_lift", v, 0.0, f64::MAX, true)?;
    }
    if let Some(v) = update.max_recommendations {
        check_range("max_recommendations", f64::from(v), 1.0, f64::MAX, true)?;
    }
    if let Some(v) = update.refresh_interval_days {
        check_range("refresh_interval_days", f64::from(v), 0.0, f64::MAX, true)?;
    }

    let mut config: recommendation_config::ActiveModel = get_or_create_config(db).await?.into();
    if let Some(v) = update.min_support {
        config.min_support = Set(v);
    }
    if let Some(v) = update.min_confidence {
        config.min_confidence = Set(v);
    }
    if let Some(v) = update.min_lift {
        config.min_lift = Set(v);
    }
    if let Some(v) = update.max_recommendations {
        config.max_recommendations = Set(v);
    }
    if let Some(v) = update.refresh_interval_days {
        config.refresh_interval_days = Set(v);
    }

    let updated = config.update(db).await?;
    info!(?update, "Recommendation config updated");
    Ok(updated)
}

/// Records the completion time of a rule replacement.
///
/// Called by the rule store inside its transaction so the timestamp only advances when
/// the new rules are committed.
pub(crate) async fn set_last_run_at<C>(db: &C, at: DateTime<Utc>) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut config: recommendation_config::ActiveModel = get_or_create_config(db).await?.into();
    config.last_run_at = Set(Some(at));
    config.update(db).await?;
    Ok(())
}

/// Calendar days (UTC) between the last completed run and `now`.
///
/// Dates are compared rather than elapsed time: a run stamped at 03:00:05 counts as one
/// day old at 03:00 the next day.
#[must_use]
pub fn days_since_last_run(
    config: &recommendation_config::Model,
    now: DateTime<Utc>,
) -> Option<i64> {
    config
        .last_run_at
        .map(|last| (now.date_naive() - last.date_naive()).num_days())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_get_or_create_config_defaults() -> Result<()> {
        let db = setup_test_db().await?;

        let config = get_or_create_config(&db).await?;
        assert_eq!(config.id, CONFIG_ID);
        assert_eq!(config.min_support, 0.01);
        assert_eq!(config.min_confidence, 0.2);
        assert_eq!(config.min_lift, 1.0);
        assert_eq!(config.max_recommendations, 5);
        assert_eq!(config.refresh_interval_days, 7);
        assert!(config.last_run_at.is_none());

        // Second call returns the same row instead of inserting another
        let again = get_or_create_config(&db).await?;
        assert_eq!(again, config);
        assert_eq!(RecommendationConfig::find().count(&db).await?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_config_partial() -> Result<()> {
        let db = setup_test_db().await?;

        let updated = update_config(
            &db,
            ConfigUpdate {
                min_support: Some(0.05),
                refresh_interval_days: Some(1),
                ..ConfigUpdate::default()
            },
        )
        .await?;

        assert_eq!(updated.min_support, 0.05);
        assert_eq!(updated.refresh_interval_days, 1);
        assert_eq!(updated.min_confidence, 0.2);

        let params = MiningParams::from(&updated);
        assert_eq!(params.min_support, 0.05);
        assert_eq!(params.min_lift, 1.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_config_rejects_out_of_range() -> Result<()> {
        let db = setup_test_db().await?;

        for update in [
            ConfigUpdate {
                min_support: Some(0.0),
                ..ConfigUpdate::default()
            },
            ConfigUpdate {
                min_confidence: Some(1.5),
                ..ConfigUpdate::default()
            },
            ConfigUpdate {
                min_lift: Some(f64::NAN),
                ..ConfigUpdate::default()
            },
            ConfigUpdate {
                max_recommendations: Some(0),
                ..ConfigUpdate::default()
            },
        ] {
            let result = update_config(&db, update).await;
            assert!(matches!(
                result.unwrap_err(),
                Error::InvalidThreshold { name: _, value: _ }
            ));
        }

        // Nothing was written
        let config = get_or_create_config(&db).await?;
        assert_eq!(config.min_support, 0.01);

        Ok(())
    }

    #[tokio::test]
    async fn test_set_last_run_at_and_days_since() -> Result<()> {
        let db = setup_test_db().await?;
        let last = Utc.with_ymd_and_hms(2024, 5, 10, 3, 0, 5).unwrap();

        set_last_run_at(&db, last).await?;
        let config = get_or_create_config(&db).await?;
        assert_eq!(config.last_run_at, Some(last));

        assert_eq!(days_since_last_run(&config, last + Duration::hours(2)), Some(0));
        // Next day's 03:00 tick is less than 24h later but one calendar day on
        assert_eq!(
            days_since_last_run(&config, last + Duration::days(1) - Duration::seconds(5)),
            Some(1)
        );
        assert_eq!(days_since_last_run(&config, last + Duration::days(7)), Some(7));

        Ok(())
    }
}
