//! # Coupon Repository
//!
//! Coupon rules, usage counters and per-customer redemptions.
//!
//! ## One Use Per Customer
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  coupon_redemptions                                                     │
//! │  ┌─────────┬────────┬──────────┬─────────────┐                          │
//! │  │ user_id │ code   │ order_id │ released_at │                          │
//! │  ├─────────┼────────┼──────────┼─────────────┤                          │
//! │  │ u1      │ SAVE10 │ o-17     │ 2026-…      │ ← order cancelled        │
//! │  │ u1      │ SAVE10 │ o-42     │ NULL        │ ← live                   │
//! │  └─────────┴────────┴──────────┴─────────────┘                          │
//! │                                                                         │
//! │  UNIQUE (user_id, coupon_code) WHERE released_at IS NULL                │
//! │  Two concurrent checkouts by u1 with SAVE10: the second INSERT fails.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use storefront_core::{Coupon, CouponScope, DiscountRule, Money};

#[derive(Debug, FromRow)]
struct CouponRow {
    id: String,
    code: String,
    discount_type: String,
    discount_value: i64,
    applies_to: String,
    targets: String,
    min_order_value: i64,
    min_quantity: i64,
    usage_limit: Option<i64>,
    used_count: i64,
    starts_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = DbError;

    fn try_from(row: CouponRow) -> DbResult<Self> {
        let rule = match row.discount_type.as_str() {
            "percentage" => DiscountRule::Percentage {
                bps: to_u32(row.discount_value, "discount_value")?,
            },
            "fixed" => DiscountRule::Fixed {
                amount: Money::from_minor(row.discount_value),
            },
            "free_shipping" => DiscountRule::FreeShipping,
            other => {
                return Err(DbError::Serialization(format!(
                    "unknown discount type '{other}'"
                )))
            }
        };

        let targets: Vec<String> = serde_json::from_str(&row.targets)?;
        let scope = CouponScope::from_parts(&row.applies_to, targets).ok_or_else(|| {
            DbError::Serialization(format!("unknown coupon scope '{}'", row.applies_to))
        })?;

        Ok(Coupon {
            id: row.id,
            code: row.code,
            rule,
            scope,
            min_order_value: Money::from_minor(row.min_order_value),
            min_quantity: to_u32(row.min_quantity, "min_quantity")?,
            usage_limit: row
                .usage_limit
                .map(|limit| to_u32(limit, "usage_limit"))
                .transpose()?,
            used_count: to_u32(row.used_count, "used_count")?,
            starts_at: row.starts_at,
            expires_at: row.expires_at,
            is_active: row.is_active,
        })
    }
}

fn to_u32(value: i64, column: &str) -> DbResult<u32> {
    u32::try_from(value)
        .map_err(|_| DbError::Serialization(format!("{column} out of range: {value}")))
}

fn rule_value(rule: &DiscountRule) -> i64 {
    match rule {
        DiscountRule::Percentage { bps } => i64::from(*bps),
        DiscountRule::Fixed { amount } => amount.minor(),
        DiscountRule::FreeShipping => 0,
    }
}

const SELECT_COUPON: &str = r#"
    SELECT id, code, discount_type, discount_value, applies_to, targets,
           min_order_value, min_quantity, usage_limit, used_count,
           starts_at, expires_at, is_active
    FROM coupons
"#;

/// Repository for coupons and redemptions.
#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

impl CouponRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CouponRepository { pool }
    }

    /// Inserts a coupon.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - code already exists
    pub async fn insert(&self, coupon: &Coupon) -> DbResult<()> {
        debug!(code = %coupon.code, "Inserting coupon");

        sqlx::query(
            r#"
            INSERT INTO coupons (
                id, code, discount_type, discount_value, applies_to, targets,
                min_order_value, min_quantity, usage_limit, used_count,
                starts_at, expires_at, is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&coupon.id)
        .bind(&coupon.code)
        .bind(coupon.rule.kind())
        .bind(rule_value(&coupon.rule))
        .bind(coupon.scope.kind())
        .bind(serde_json::to_string(coupon.scope.targets())?)
        .bind(coupon.min_order_value.minor())
        .bind(i64::from(coupon.min_quantity))
        .bind(coupon.usage_limit.map(i64::from))
        .bind(i64::from(coupon.used_count))
        .bind(coupon.starts_at)
        .bind(coupon.expires_at)
        .bind(coupon.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> DbResult<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(&format!("{SELECT_COUPON} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Coupon::try_from).transpose()
    }

    /// Looks a coupon up by its normalised (upper-case) code.
    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(&format!("{SELECT_COUPON} WHERE code = ?1"))
            .bind(code.trim().to_uppercase())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Coupon::try_from).transpose()
    }

    /// Resolves by id, falling back to the code.
    pub async fn resolve(&self, id_or_code: &str) -> DbResult<Option<Coupon>> {
        match self.find_by_id(id_or_code).await? {
            Some(coupon) => Ok(Some(coupon)),
            None => self.find_by_code(id_or_code).await,
        }
    }

    /// Bumps the usage counter, deactivating the coupon when it reaches
    /// its limit. One statement, so concurrent checkouts cannot both see
    /// the last free slot as unused.
    pub async fn increment_usage(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE coupons
            SET used_count = used_count + 1,
                is_active = CASE
                    WHEN usage_limit IS NOT NULL AND used_count + 1 >= usage_limit THEN 0
                    ELSE is_active
                END
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Coupon", id));
        }
        Ok(())
    }

    // =========================================================================
    // Redemptions
    // =========================================================================

    /// Whether the customer holds a live redemption of `code`.
    pub async fn has_live_redemption(&self, user_id: &str, code: &str) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM coupon_redemptions
            WHERE user_id = ?1 AND coupon_code = ?2 AND released_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(code)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Claims the customer's single use of `code` for an order.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - a live claim already exists
    pub async fn claim(&self, user_id: &str, code: &str, order_id: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO coupon_redemptions (id, user_id, coupon_code, order_id, claimed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(generate_id())
        .bind(user_id)
        .bind(code)
        .bind(order_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("coupon redemption", code),
            other => other,
        })?;

        info!(user_id = %user_id, code = %code, order_id = %order_id, "Coupon redemption claimed");
        Ok(())
    }

    /// Releases the live claims held by an order.
    ///
    /// ## Returns
    /// Number of claims released (0 when the order used no coupon).
    pub async fn release_for_order(&self, order_id: &str) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE coupon_redemptions
            SET released_at = ?2
            WHERE order_id = ?1 AND released_at IS NULL
            "#,
        )
        .bind(order_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
