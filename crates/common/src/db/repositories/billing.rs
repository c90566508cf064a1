//! Billing repository: plans, subscriptions, payments and invoices
//!
//! Subscriptions, payments and invoices are keyed by their Stripe id so
//! replayed webhooks update the existing row instead of inserting a new one.

use crate::db::models::*;
use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewPlan {
    pub code: String,
    pub name: String,
    pub stripe_price_id: String,
    pub price_cents: i64,
    pub currency: String,
    pub interval: BillingInterval,
    pub tokens_per_period: i32,
}

/// Subscription state as reported by Stripe
#[derive(Debug, Clone)]
pub struct SubscriptionRecord {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub stripe_subscription_id: String,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub stripe_payment_intent_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub promotional_code_id: Option<Uuid>,
}

/// Invoice state as reported by Stripe
#[derive(Debug, Clone)]
pub struct InvoiceRecord {
    pub user_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub stripe_invoice_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: InvoiceStatus,
    pub hosted_url: Option<String>,
}

pub struct BillingRepository;

impl BillingRepository {
    // ========================================================================
    // Plans
    // ========================================================================

    pub async fn create_plan<C: ConnectionTrait>(db: &C, new: NewPlan) -> Result<SubscriptionPlan> {
        let plan = SubscriptionPlanActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(new.code),
            name: Set(new.name),
            stripe_price_id: Set(new.stripe_price_id),
            price_cents: Set(new.price_cents),
            currency: Set(new.currency.to_lowercase()),
            billing_interval: Set(new.interval.into()),
            tokens_per_period: Set(new.tokens_per_period),
            is_active: Set(true),
            created_at: Set(Utc::now().into()),
        };

        plan.insert(db).await.map_err(Into::into)
    }

    pub async fn list_active_plans<C: ConnectionTrait>(db: &C) -> Result<Vec<SubscriptionPlan>> {
        SubscriptionPlanEntity::find()
            .filter(SubscriptionPlanColumn::IsActive.eq(true))
            .order_by_asc(SubscriptionPlanColumn::PriceCents)
            .all(db)
            .await
            .map_err(Into::into)
    }

    /// Active plan by its public code
    pub async fn get_plan_by_code<C: ConnectionTrait>(db: &C, code: &str) -> Result<SubscriptionPlan> {
        SubscriptionPlanEntity::find()
            .filter(SubscriptionPlanColumn::Code.eq(code))
            .filter(SubscriptionPlanColumn::IsActive.eq(true))
            .one(db)
            .await?
            .ok_or_else(|| AppError::PlanNotFound {
                code: code.to_string(),
            })
    }

    pub async fn find_plan<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<SubscriptionPlan>> {
        SubscriptionPlanEntity::find_by_id(id)
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub async fn find_plan_by_price<C: ConnectionTrait>(
        db: &C,
        stripe_price_id: &str,
    ) -> Result<Option<SubscriptionPlan>> {
        SubscriptionPlanEntity::find()
            .filter(SubscriptionPlanColumn::StripePriceId.eq(stripe_price_id))
            .one(db)
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    pub async fn find_subscription_by_stripe_id<C: ConnectionTrait>(
        db: &C,
        stripe_subscription_id: &str,
    ) -> Result<Option<Subscription>> {
        SubscriptionEntity::find()
            .filter(SubscriptionColumn::StripeSubscriptionId.eq(stripe_subscription_id))
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Insert or update the row for `record.stripe_subscription_id`
    pub async fn upsert_subscription<C: ConnectionTrait>(
        db: &C,
        record: SubscriptionRecord,
    ) -> Result<Subscription> {
        let now = Utc::now();

        match Self::find_subscription_by_stripe_id(db, &record.stripe_subscription_id).await? {
            Some(existing) => {
                let mut active = existing.into_active_model();
                active.plan_id = Set(record.plan_id);
                active.status = Set(record.status.into());
                active.current_period_end = Set(record.current_period_end.map(Into::into));
                active.cancel_at_period_end = Set(record.cancel_at_period_end);
                active.updated_at = Set(now.into());
                active.update(db).await.map_err(Into::into)
            }
            None => {
                let subscription = SubscriptionActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(record.user_id),
                    plan_id: Set(record.plan_id),
                    stripe_subscription_id: Set(record.stripe_subscription_id),
                    status: Set(record.status.into()),
                    current_period_end: Set(record.current_period_end.map(Into::into)),
                    cancel_at_period_end: Set(record.cancel_at_period_end),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                };
                subscription.insert(db).await.map_err(Into::into)
            }
        }
    }

    /// Most recent subscription that is still active or past due
    pub async fn find_live_subscription<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Option<Subscription>> {
        SubscriptionEntity::find()
            .filter(SubscriptionColumn::UserId.eq(user_id))
            .filter(SubscriptionColumn::Status.is_in([
                SubscriptionStatus::Active.as_str(),
                SubscriptionStatus::PastDue.as_str(),
            ]))
            .order_by_desc(SubscriptionColumn::CreatedAt)
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Most recent subscription that is not canceled, including one still awaiting its first payment
    pub async fn find_open_subscription<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Option<Subscription>> {
        SubscriptionEntity::find()
            .filter(SubscriptionColumn::UserId.eq(user_id))
            .filter(SubscriptionColumn::Status.ne(SubscriptionStatus::Canceled.as_str()))
            .order_by_desc(SubscriptionColumn::CreatedAt)
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub async fn list_subscriptions<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<Vec<Subscription>> {
        SubscriptionEntity::find()
            .filter(SubscriptionColumn::UserId.eq(user_id))
            .order_by_desc(SubscriptionColumn::CreatedAt)
            .all(db)
            .await
            .map_err(Into::into)
    }

    pub async fn set_subscription_status<C: ConnectionTrait>(
        db: &C,
        stripe_subscription_id: &str,
        status: SubscriptionStatus,
    ) -> Result<bool> {
        let result = SubscriptionEntity::update_many()
            .col_expr(SubscriptionColumn::Status, Expr::value(status.as_str()))
            .col_expr(SubscriptionColumn::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(SubscriptionColumn::StripeSubscriptionId.eq(stripe_subscription_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Payments
    // ========================================================================

    pub async fn create_payment<C: ConnectionTrait>(db: &C, new: NewPayment) -> Result<Payment> {
        let now = Utc::now();

        let payment = PaymentActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(new.user_id),
            stripe_payment_intent_id: Set(new.stripe_payment_intent_id),
            amount_cents: Set(new.amount_cents),
            currency: Set(new.currency.to_lowercase()),
            status: Set(new.status.into()),
            promotional_code_id: Set(new.promotional_code_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        payment.insert(db).await.map_err(Into::into)
    }

    pub async fn find_payment_by_intent<C: ConnectionTrait>(
        db: &C,
        stripe_payment_intent_id: &str,
    ) -> Result<Option<Payment>> {
        PaymentEntity::find()
            .filter(PaymentColumn::StripePaymentIntentId.eq(stripe_payment_intent_id))
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Move a payment to `status`; returns `false` if it already had it or is unknown
    pub async fn set_payment_status<C: ConnectionTrait>(
        db: &C,
        stripe_payment_intent_id: &str,
        status: PaymentStatus,
    ) -> Result<bool> {
        let result = PaymentEntity::update_many()
            .col_expr(PaymentColumn::Status, Expr::value(status.as_str()))
            .col_expr(PaymentColumn::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(PaymentColumn::StripePaymentIntentId.eq(stripe_payment_intent_id))
            .filter(PaymentColumn::Status.ne(status.as_str()))
            .exec(db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn list_payments<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<Vec<Payment>> {
        PaymentEntity::find()
            .filter(PaymentColumn::UserId.eq(user_id))
            .order_by_desc(PaymentColumn::CreatedAt)
            .all(db)
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Invoices
    // ========================================================================

    pub async fn find_invoice_by_stripe_id<C: ConnectionTrait>(
        db: &C,
        stripe_invoice_id: &str,
    ) -> Result<Option<Invoice>> {
        InvoiceEntity::find()
            .filter(InvoiceColumn::StripeInvoiceId.eq(stripe_invoice_id))
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub async fn upsert_invoice<C: ConnectionTrait>(db: &C, record: InvoiceRecord) -> Result<Invoice> {
        match Self::find_invoice_by_stripe_id(db, &record.stripe_invoice_id).await? {
            Some(existing) => {
                let mut active = existing.into_active_model();
                active.amount_cents = Set(record.amount_cents);
                active.status = Set(record.status.into());
                if record.hosted_url.is_some() {
                    active.hosted_url = Set(record.hosted_url);
                }
                if record.subscription_id.is_some() {
                    active.subscription_id = Set(record.subscription_id);
                }
                active.update(db).await.map_err(Into::into)
            }
            None => {
                let invoice = InvoiceActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(record.user_id),
                    subscription_id: Set(record.subscription_id),
                    stripe_invoice_id: Set(record.stripe_invoice_id),
                    amount_cents: Set(record.amount_cents),
                    currency: Set(record.currency.to_lowercase()),
                    status: Set(record.status.into()),
                    hosted_url: Set(record.hosted_url),
                    issued_at: Set(Utc::now().into()),
                };
                invoice.insert(db).await.map_err(Into::into)
            }
        }
    }

    /// Move an invoice to `status`; returns `false` if it already had it or is unknown
    pub async fn set_invoice_status<C: ConnectionTrait>(
        db: &C,
        stripe_invoice_id: &str,
        status: InvoiceStatus,
    ) -> Result<bool> {
        let result = InvoiceEntity::update_many()
            .col_expr(InvoiceColumn::Status, Expr::value(status.as_str()))
            .filter(InvoiceColumn::StripeInvoiceId.eq(stripe_invoice_id))
            .filter(InvoiceColumn::Status.ne(status.as_str()))
            .exec(db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn list_invoices<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<Vec<Invoice>> {
        InvoiceEntity::find()
            .filter(InvoiceColumn::UserId.eq(user_id))
            .order_by_desc(InvoiceColumn::IssuedAt)
            .all(db)
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_plan, create_test_user, setup_test_db};

    #[tokio::test]
    async fn test_plans_listed_by_price() {
        let pool = setup_test_db().await.unwrap();
        create_test_plan(pool.write(), "yearly", 9900, 600).await.unwrap();
        create_test_plan(pool.write(), "monthly", 990, 50).await.unwrap();

        let plans = BillingRepository::list_active_plans(pool.read()).await.unwrap();
        let codes: Vec<_> = plans.iter().map(|p| p.code.as_str()).collect();
        assert_eq!(codes, vec!["monthly", "yearly"]);
    }

    #[tokio::test]
    async fn test_unknown_plan_code() {
        let pool = setup_test_db().await.unwrap();
        let err = BillingRepository::get_plan_by_code(pool.read(), "weekly").await.unwrap_err();
        assert!(matches!(err, AppError::PlanNotFound { .. }));
    }

    #[tokio::test]
    async fn test_subscription_upsert_updates_existing_row() {
        let pool = setup_test_db().await.unwrap();
        let user = create_test_user(pool.write(), "p@example.com", Role::Parent).await.unwrap();
        let plan = create_test_plan(pool.write(), "monthly", 990, 50).await.unwrap();

        let record = SubscriptionRecord {
            user_id: user.id,
            plan_id: plan.id,
            stripe_subscription_id: "sub_123".into(),
            status: SubscriptionStatus::Incomplete,
            current_period_end: None,
            cancel_at_period_end: false,
        };
        let first = BillingRepository::upsert_subscription(pool.write(), record.clone())
            .await
            .unwrap();
        let second = BillingRepository::upsert_subscription(
            pool.write(),
            SubscriptionRecord {
                status: SubscriptionStatus::Active,
                ..record
            },
        )
        .await
        .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.status(), SubscriptionStatus::Active);
        let live = BillingRepository::find_live_subscription(pool.read(), user.id)
            .await
            .unwrap();
        assert_eq!(live.map(|s| s.id), Some(first.id));
    }

    #[tokio::test]
    async fn test_open_subscription_includes_incomplete() {
        let pool = setup_test_db().await.unwrap();
        let user = create_test_user(pool.write(), "o@example.com", Role::Parent).await.unwrap();
        let plan = create_test_plan(pool.write(), "monthly", 990, 50).await.unwrap();
        let record = SubscriptionRecord {
            user_id: user.id,
            plan_id: plan.id,
            stripe_subscription_id: "sub_open".into(),
            status: SubscriptionStatus::Incomplete,
            current_period_end: None,
            cancel_at_period_end: false,
        };
        BillingRepository::upsert_subscription(pool.write(), record).await.unwrap();

        assert!(BillingRepository::find_live_subscription(pool.read(), user.id)
            .await
            .unwrap()
            .is_none());
        assert!(BillingRepository::find_open_subscription(pool.read(), user.id)
            .await
            .unwrap()
            .is_some());

        BillingRepository::set_subscription_status(pool.write(), "sub_open", SubscriptionStatus::Canceled)
            .await
            .unwrap();
        assert!(BillingRepository::find_open_subscription(pool.read(), user.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_payment_status_transition_reported_once() {
        let pool = setup_test_db().await.unwrap();
        let user = create_test_user(pool.write(), "q@example.com", Role::Parent).await.unwrap();
        BillingRepository::create_payment(
            pool.write(),
            NewPayment {
                user_id: user.id,
                stripe_payment_intent_id: "pi_1".into(),
                amount_cents: 500,
                currency: "EUR".into(),
                status: PaymentStatus::Pending,
                promotional_code_id: None,
            },
        )
        .await
        .unwrap();

        assert!(BillingRepository::set_payment_status(pool.write(), "pi_1", PaymentStatus::Succeeded)
            .await
            .unwrap());
        assert!(!BillingRepository::set_payment_status(pool.write(), "pi_1", PaymentStatus::Succeeded)
            .await
            .unwrap());

        let payments = BillingRepository::list_payments(pool.read(), user.id).await.unwrap();
        assert_eq!(payments[0].currency, "eur");
        assert_eq!(payments[0].status(), PaymentStatus::Succeeded);
    }
}
