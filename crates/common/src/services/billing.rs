//! Subscriptions, promotional codes and payment webhooks
//!
//! Stripe is the source of truth for subscription and payment state. Local
//! rows are keyed by Stripe ids and every webhook handler is idempotent, so
//! redelivered events change nothing.

use crate::config::StripeConfig;
use crate::db::models::{
    InvoiceStatus, PaymentStatus, PromotionalCode, Subscription, SubscriptionPlan,
    SubscriptionStatus, User,
};
use crate::db::repositories::{
    is_unique_violation, BillingRepository, InvoiceRecord, NewPayment, PromotionalCodeRepository,
    SubscriptionRecord, TokenBalanceRepository, UserRepository,
};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::integrations::webhook::{
    verify_signature, InvoiceObject, PaymentIntentObject, SubscriptionObject, WebhookEvent,
};
use crate::integrations::PaymentGateway;
use crate::metrics;
use crate::schemas::CheckoutInput;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub subscription: Subscription,
    /// Secret used by the front-end to confirm the first payment
    pub client_secret: Option<String>,
    pub bonus_tokens: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoPreview {
    pub code: String,
    pub percent_off: Option<i32>,
    pub bonus_tokens: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookOutcome {
    pub event_id: String,
    pub event_type: String,
    /// `false` for ignored event types and replays
    pub processed: bool,
}

#[derive(Clone)]
pub struct BillingService {
    db: DbPool,
    payments: Arc<dyn PaymentGateway>,
    webhook_secret: Option<String>,
    tolerance_secs: i64,
}

impl BillingService {
    pub fn new(db: DbPool, payments: Arc<dyn PaymentGateway>, config: &StripeConfig) -> Self {
        Self {
            db,
            payments,
            webhook_secret: config.webhook_secret.clone(),
            tolerance_secs: config.webhook_tolerance_secs,
        }
    }

    pub async fn list_plans(&self) -> Result<Vec<SubscriptionPlan>> {
        BillingRepository::list_active_plans(self.db.read()).await
    }

    /// What a code would grant, without redeeming it
    pub async fn preview_promo(&self, code: &str) -> Result<PromoPreview> {
        let promo = self.redeemable_promo(code).await?;
        Ok(PromoPreview {
            code: promo.code,
            percent_off: promo.percent_off,
            bonus_tokens: promo.bonus_tokens,
        })
    }

    /// Subscribe the user to a plan, optionally redeeming a promotional code
    pub async fn checkout(&self, user_id: Uuid, input: CheckoutInput) -> Result<CheckoutSession> {
        input.validate()?;

        let user = UserRepository::get(self.db.read(), user_id).await?;
        let plan = BillingRepository::get_plan_by_code(self.db.read(), &input.plan_code).await?;

        if BillingRepository::find_open_subscription(self.db.read(), user.id)
            .await?
            .is_some()
        {
            return Err(subscription_exists());
        }

        let promo = match input.promo_code.as_deref() {
            Some(code) => Some(self.redeemable_promo(code).await?),
            None => None,
        };

        let customer_id = self.ensure_customer(user).await?;
        let coupon = match promo.as_ref().and_then(|p| p.percent_off) {
            Some(percent) => Some(self.payments.create_coupon(percent).await?),
            None => None,
        };

        let created = self
            .payments
            .create_subscription(&customer_id, &plan.stripe_price_id, coupon.as_deref())
            .await?;

        let record = SubscriptionRecord {
            user_id,
            plan_id: plan.id,
            stripe_subscription_id: created.id.clone(),
            status: SubscriptionStatus::from_stripe(&created.status),
            current_period_end: created.current_period_end,
            cancel_at_period_end: created.cancel_at_period_end,
        };
        let payment = created.payment_intent_id.clone().map(|intent| NewPayment {
            user_id,
            stripe_payment_intent_id: intent,
            amount_cents: created.amount_due,
            currency: if created.currency.is_empty() {
                plan.currency.clone()
            } else {
                created.currency.clone()
            },
            status: PaymentStatus::Pending,
            promotional_code_id: promo.as_ref().map(|p| p.id),
        });
        let redemption = promo
            .as_ref()
            .map(|p| (p.id, p.code.clone(), i64::from(p.bonus_tokens)));

        let result = self
            .db
            .unit_of_work()
            .run(move |txn| {
                Box::pin(async move {
                    // A concurrent checkout may have recorded its subscription since the first check
                    if BillingRepository::find_open_subscription(txn, user_id).await?.is_some() {
                        return Err(subscription_exists());
                    }
                    let subscription = BillingRepository::upsert_subscription(txn, record).await?;
                    if let Some(payment) = payment {
                        BillingRepository::create_payment(txn, payment).await?;
                    }
                    if let Some((promo_id, code, bonus)) = redemption {
                        if !PromotionalCodeRepository::redeem(txn, promo_id).await? {
                            return Err(AppError::InvalidPromotionalCode { code });
                        }
                        if bonus > 0 {
                            TokenBalanceRepository::credit(txn, user_id, bonus).await?;
                        }
                    }
                    Ok(subscription)
                })
            })
            .await;

        let subscription = match result {
            Ok(subscription) => subscription,
            Err(err) => {
                if let Err(cancel_err) = self.payments.cancel_subscription(&created.id).await {
                    error!(
                        subscription_id = %created.id,
                        error = %cancel_err,
                        "Failed to cancel orphaned Stripe subscription"
                    );
                }
                return Err(err);
            }
        };

        let bonus_tokens = promo.as_ref().map(|p| p.bonus_tokens).unwrap_or(0);
        if bonus_tokens > 0 {
            metrics::record_tokens_credited(i64::from(bonus_tokens), "promotion");
        }
        info!(
            %user_id,
            plan = %plan.code,
            subscription_id = %subscription.stripe_subscription_id,
            promo = promo.as_ref().map(|p| p.code.as_str()).unwrap_or("-"),
            "Checkout completed"
        );

        Ok(CheckoutSession {
            subscription,
            client_secret: created.client_secret,
            bonus_tokens,
        })
    }

    /// Cancel the user's subscription at the end of the current period
    pub async fn cancel(&self, user_id: Uuid) -> Result<Subscription> {
        let live = BillingRepository::find_live_subscription(self.db.read(), user_id)
            .await?
            .ok_or_else(|| AppError::not_found("subscription", user_id))?;

        let updated = self
            .payments
            .cancel_subscription(&live.stripe_subscription_id)
            .await?;

        let subscription = BillingRepository::upsert_subscription(
            self.db.write(),
            SubscriptionRecord {
                user_id: live.user_id,
                plan_id: live.plan_id,
                stripe_subscription_id: live.stripe_subscription_id,
                status: SubscriptionStatus::from_stripe(&updated.status),
                current_period_end: updated
                    .current_period_end
                    .or_else(|| live.current_period_end.map(|d| d.with_timezone(&Utc))),
                cancel_at_period_end: updated.cancel_at_period_end,
            },
        )
        .await?;

        info!(%user_id, subscription_id = %subscription.stripe_subscription_id, "Subscription set to cancel");
        Ok(subscription)
    }

    /// Verify and apply one webhook delivery
    pub async fn handle_webhook(&self, payload: &[u8], signature: Option<&str>) -> Result<WebhookOutcome> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or_else(|| AppError::Configuration {
                message: "stripe.webhook_secret is not configured".to_string(),
            })?;
        let header = signature.ok_or(AppError::InvalidWebhookSignature)?;
        verify_signature(payload, header, secret, self.tolerance_secs, Utc::now().timestamp())?;

        let event = WebhookEvent::parse(payload)?;
        let result = self.dispatch(&event).await;

        let outcome = match &result {
            Ok(true) => "processed",
            Ok(false) => "ignored",
            Err(_) => "failed",
        };
        metrics::record_webhook_event(&event.event_type, outcome);
        debug!(event_id = %event.id, event_type = %event.event_type, outcome, "Webhook handled");

        Ok(WebhookOutcome {
            processed: result?,
            event_id: event.id,
            event_type: event.event_type,
        })
    }

    async fn dispatch(&self, event: &WebhookEvent) -> Result<bool> {
        match event.event_type.as_str() {
            "invoice.paid" => self.invoice_paid(event.object()?).await,
            "invoice.payment_failed" => self.invoice_failed(event.object()?).await,
            "customer.subscription.created" | "customer.subscription.updated" => {
                self.sync_subscription(event.object()?, false).await
            }
            "customer.subscription.deleted" => self.sync_subscription(event.object()?, true).await,
            "payment_intent.succeeded" => {
                self.payment_intent(event.object()?, PaymentStatus::Succeeded).await
            }
            "payment_intent.payment_failed" => {
                self.payment_intent(event.object()?, PaymentStatus::Failed).await
            }
            _ => Ok(false),
        }
    }

    /// Record the invoice as paid and credit the plan's tokens, once
    async fn invoice_paid(&self, invoice: InvoiceObject) -> Result<bool> {
        let Some(user) = self.user_for_customer(invoice.customer.as_deref()).await? else {
            return Ok(false);
        };

        let subscription = match invoice.subscription.as_deref() {
            Some(id) => BillingRepository::find_subscription_by_stripe_id(self.db.read(), id).await?,
            None => None,
        };
        let plan = match (&subscription, invoice.price_id()) {
            (Some(sub), _) => BillingRepository::find_plan(self.db.read(), sub.plan_id).await?,
            (None, Some(price)) => BillingRepository::find_plan_by_price(self.db.read(), price).await?,
            (None, None) => None,
        };
        let tokens = plan.map(|p| i64::from(p.tokens_per_period)).unwrap_or(0);

        let user_id = user.id;
        let stripe_subscription_id = subscription.as_ref().map(|s| s.stripe_subscription_id.clone());
        let record = InvoiceRecord {
            user_id,
            subscription_id: subscription.as_ref().map(|s| s.id),
            stripe_invoice_id: invoice.id.clone(),
            amount_cents: invoice.amount_paid,
            currency: invoice.currency.clone(),
            status: InvoiceStatus::Paid,
            hosted_url: invoice.hosted_invoice_url.clone(),
        };

        let result = self
            .db
            .unit_of_work()
            .run(move |txn| {
                Box::pin(async move {
                    let existing =
                        BillingRepository::find_invoice_by_stripe_id(txn, &record.stripe_invoice_id).await?;
                    let newly_paid = if existing.is_some() {
                        BillingRepository::set_invoice_status(txn, &record.stripe_invoice_id, InvoiceStatus::Paid)
                            .await?
                    } else {
                        BillingRepository::upsert_invoice(txn, record).await?;
                        true
                    };
                    if !newly_paid {
                        return Ok(false);
                    }

                    if let Some(id) = stripe_subscription_id {
                        // A late first invoice must not revive a deleted subscription
                        let current = BillingRepository::find_subscription_by_stripe_id(txn, &id).await?;
                        if current.is_some_and(|s| s.status() != SubscriptionStatus::Canceled) {
                            BillingRepository::set_subscription_status(txn, &id, SubscriptionStatus::Active)
                                .await?;
                        }
                    }
                    if tokens > 0 {
                        TokenBalanceRepository::credit(txn, user_id, tokens).await?;
                    }
                    Ok(true)
                })
            })
            .await;

        match result {
            Ok(true) => {
                metrics::record_tokens_credited(tokens, "invoice");
                info!(%user_id, invoice_id = %invoice.id, tokens, "Invoice paid");
                Ok(true)
            }
            Ok(false) => Ok(false),
            // Concurrent delivery of the same invoice inserted it first
            Err(AppError::Database(ref e)) if is_unique_violation(e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn invoice_failed(&self, invoice: InvoiceObject) -> Result<bool> {
        let Some(user) = self.user_for_customer(invoice.customer.as_deref()).await? else {
            return Ok(false);
        };

        let subscription = match invoice.subscription.as_deref() {
            Some(id) => BillingRepository::find_subscription_by_stripe_id(self.db.read(), id).await?,
            None => None,
        };

        if BillingRepository::find_invoice_by_stripe_id(self.db.read(), &invoice.id)
            .await?
            .is_none()
        {
            let inserted = BillingRepository::upsert_invoice(
                self.db.write(),
                InvoiceRecord {
                    user_id: user.id,
                    subscription_id: subscription.as_ref().map(|s| s.id),
                    stripe_invoice_id: invoice.id.clone(),
                    amount_cents: invoice.amount_due,
                    currency: invoice.currency.clone(),
                    status: InvoiceStatus::Open,
                    hosted_url: invoice.hosted_invoice_url.clone(),
                },
            )
            .await;
            match inserted {
                Err(AppError::Database(ref e)) if is_unique_violation(e) => {}
                other => {
                    other?;
                }
            }
        }

        if let Some(sub) = subscription {
            BillingRepository::set_subscription_status(
                self.db.write(),
                &sub.stripe_subscription_id,
                SubscriptionStatus::PastDue,
            )
            .await?;
        }

        warn!(user_id = %user.id, invoice_id = %invoice.id, "Invoice payment failed");
        Ok(true)
    }

    async fn sync_subscription(&self, object: SubscriptionObject, deleted: bool) -> Result<bool> {
        let status = if deleted {
            SubscriptionStatus::Canceled
        } else {
            SubscriptionStatus::from_stripe(&object.status)
        };

        let plan = match object.price_id() {
            Some(price) => BillingRepository::find_plan_by_price(self.db.read(), price).await?,
            None => None,
        };

        let existing = BillingRepository::find_subscription_by_stripe_id(self.db.read(), &object.id).await?;
        let (user_id, plan_id) = match (existing, plan) {
            (Some(sub), plan) => (sub.user_id, plan.map(|p| p.id).unwrap_or(sub.plan_id)),
            (None, Some(plan)) => match self.user_for_customer(object.customer.as_deref()).await? {
                Some(user) => (user.id, plan.id),
                None => return Ok(false),
            },
            (None, None) => {
                warn!(subscription_id = %object.id, "Subscription for an unknown price");
                return Ok(false);
            }
        };

        BillingRepository::upsert_subscription(
            self.db.write(),
            SubscriptionRecord {
                user_id,
                plan_id,
                stripe_subscription_id: object.id.clone(),
                status,
                current_period_end: object
                    .current_period_end
                    .and_then(|ts| DateTime::from_timestamp(ts, 0)),
                cancel_at_period_end: object.cancel_at_period_end,
            },
        )
        .await?;

        info!(%user_id, subscription_id = %object.id, %status, "Subscription synced");
        Ok(true)
    }

    async fn payment_intent(&self, intent: PaymentIntentObject, status: PaymentStatus) -> Result<bool> {
        if BillingRepository::set_payment_status(self.db.write(), &intent.id, status).await? {
            info!(payment_intent = %intent.id, %status, "Payment updated");
            return Ok(true);
        }
        if BillingRepository::find_payment_by_intent(self.db.read(), &intent.id)
            .await?
            .is_some()
        {
            return Ok(false);
        }

        let Some(user) = self.user_for_customer(intent.customer.as_deref()).await? else {
            return Ok(false);
        };
        let created = BillingRepository::create_payment(
            self.db.write(),
            NewPayment {
                user_id: user.id,
                stripe_payment_intent_id: intent.id.clone(),
                amount_cents: intent.amount,
                currency: intent.currency,
                status,
                promotional_code_id: None,
            },
        )
        .await;

        match created {
            Ok(_) => Ok(true),
            Err(AppError::Database(ref e)) if is_unique_violation(e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn redeemable_promo(&self, code: &str) -> Result<PromotionalCode> {
        PromotionalCodeRepository::find_by_code(self.db.read(), code)
            .await?
            .filter(|p| p.is_redeemable())
            .ok_or_else(|| AppError::InvalidPromotionalCode {
                code: code.trim().to_uppercase(),
            })
    }

    async fn ensure_customer(&self, user: User) -> Result<String> {
        if let Some(ref id) = user.stripe_customer_id {
            return Ok(id.clone());
        }

        let customer_id = self
            .payments
            .create_customer(&user.email, &user.full_name(), user.id)
            .await?;
        UserRepository::set_stripe_customer(self.db.write(), user, customer_id.clone()).await?;
        Ok(customer_id)
    }

    async fn user_for_customer(&self, customer: Option<&str>) -> Result<Option<User>> {
        let Some(customer) = customer else {
            return Ok(None);
        };
        let user = UserRepository::find_by_stripe_customer(self.db.read(), customer).await?;
        if user.is_none() {
            warn!(customer, "Webhook for an unknown Stripe customer");
        }
        Ok(user)
    }
}

fn subscription_exists() -> AppError {
    AppError::Conflict {
        message: "A subscription is already active or awaiting payment".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;
    use crate::db::repositories::NewPromotionalCode;
    use crate::integrations::webhook::signature_header;
    use crate::schemas::CheckoutInput;
    use crate::services::fakes::FakePayments;
    use crate::test_utils::{create_test_plan, create_test_user, setup_test_db};
    use chrono::Duration;

    const SECRET: &str = "whsec_test";

    struct Fixture {
        billing: BillingService,
        payments: Arc<FakePayments>,
        pool: DbPool,
        user: User,
        plan: SubscriptionPlan,
    }

    async fn fixture_with(payments: FakePayments) -> Fixture {
        let pool = setup_test_db().await.unwrap();
        let payments = Arc::new(payments);
        let config = StripeConfig {
            webhook_secret: Some(SECRET.into()),
            ..StripeConfig::default()
        };
        let billing = BillingService::new(pool.clone(), payments.clone(), &config);
        let user = create_test_user(pool.write(), "parent@example.com", Role::Parent).await.unwrap();
        let plan = create_test_plan(pool.write(), "monthly", 990, 50).await.unwrap();
        Fixture { billing, payments, pool, user, plan }
    }

    async fn fixture() -> Fixture {
        fixture_with(FakePayments::default()).await
    }

    async fn promo(pool: &DbPool, code: &str, percent_off: Option<i32>, bonus: i32, max: Option<i32>) -> PromotionalCode {
        PromotionalCodeRepository::create(
            pool.write(),
            NewPromotionalCode {
                code: code.into(),
                percent_off,
                bonus_tokens: bonus,
                max_redemptions: max,
                expires_at: None,
            },
        )
        .await
        .unwrap()
    }

    fn checkout(promo_code: Option<&str>) -> CheckoutInput {
        CheckoutInput {
            plan_code: "monthly".into(),
            promo_code: promo_code.map(String::from),
        }
    }

    fn signed(event: serde_json::Value) -> (Vec<u8>, String) {
        let payload = event.to_string().into_bytes();
        let header = signature_header(&payload, SECRET, Utc::now().timestamp()).unwrap();
        (payload, header)
    }

    fn invoice_paid_event(event_id: &str, invoice_id: &str, subscription: &str, customer: &str) -> serde_json::Value {
        serde_json::json!({
            "id": event_id,
            "type": "invoice.paid",
            "data": { "object": {
                "id": invoice_id,
                "customer": customer,
                "subscription": subscription,
                "amount_paid": 990,
                "currency": "eur"
            }}
        })
    }

    #[tokio::test]
    async fn test_checkout_with_promo_credits_bonus() {
        let f = fixture().await;
        promo(&f.pool, "RENTREE", Some(20), 15, Some(1)).await;

        let session = f.billing.checkout(f.user.id, checkout(Some("rentree"))).await.unwrap();
        assert_eq!(session.bonus_tokens, 15);
        assert!(session.client_secret.is_some());
        assert_eq!(session.subscription.status(), SubscriptionStatus::Incomplete);

        assert_eq!(*f.payments.coupons.lock().unwrap(), vec![20]);
        let subs = f.payments.subscriptions.lock().unwrap().clone();
        assert_eq!(subs[0].1, "price_monthly");
        assert_eq!(subs[0].2.as_deref(), Some("coupon_20"));

        assert_eq!(TokenBalanceRepository::get(f.pool.read(), f.user.id).await.unwrap(), 15);
        let payments = BillingRepository::list_payments(f.pool.read(), f.user.id).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert!(payments[0].promotional_code_id.is_some());

        let code = PromotionalCodeRepository::find_by_code(f.pool.read(), "RENTREE")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(code.redemptions, 1);
    }

    #[tokio::test]
    async fn test_invalid_promo_stops_checkout_before_stripe() {
        let f = fixture().await;
        let err = f.billing.checkout(f.user.id, checkout(Some("NOPE"))).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidPromotionalCode { .. }));
        assert_eq!(err.status_code().as_u16(), 422);
        assert!(f.payments.subscriptions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_and_expired_promos_rejected() {
        let f = fixture().await;
        let used = promo(&f.pool, "USED", None, 5, Some(1)).await;
        PromotionalCodeRepository::redeem(f.pool.write(), used.id).await.unwrap();
        PromotionalCodeRepository::create(
            f.pool.write(),
            NewPromotionalCode {
                code: "OLD".into(),
                percent_off: Some(10),
                bonus_tokens: 0,
                max_redemptions: None,
                expires_at: Some(Utc::now() - Duration::days(1)),
            },
        )
        .await
        .unwrap();

        assert!(f.billing.preview_promo("USED").await.is_err());
        assert!(f.billing.preview_promo("OLD").await.is_err());
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_no_rows() {
        let f = fixture_with(FakePayments {
            fail_subscriptions: true,
            ..FakePayments::default()
        })
        .await;
        promo(&f.pool, "BONUS", None, 10, None).await;

        let err = f.billing.checkout(f.user.id, checkout(Some("BONUS"))).await.unwrap_err();
        assert!(matches!(err, AppError::PaymentProvider { .. }));
        assert!(BillingRepository::list_subscriptions(f.pool.read(), f.user.id)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(TokenBalanceRepository::get(f.pool.read(), f.user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invoice_paid_credits_tokens_once() {
        let f = fixture().await;
        let session = f.billing.checkout(f.user.id, checkout(None)).await.unwrap();
        let customer = UserRepository::get(f.pool.read(), f.user.id)
            .await
            .unwrap()
            .stripe_customer_id
            .unwrap();

        let (payload, header) = signed(invoice_paid_event(
            "evt_1",
            "in_1",
            &session.subscription.stripe_subscription_id,
            &customer,
        ));
        let outcome = f.billing.handle_webhook(&payload, Some(&header)).await.unwrap();
        assert!(outcome.processed);
        assert_eq!(TokenBalanceRepository::get(f.pool.read(), f.user.id).await.unwrap(), 50);

        let replay = f.billing.handle_webhook(&payload, Some(&header)).await.unwrap();
        assert!(!replay.processed);
        assert_eq!(TokenBalanceRepository::get(f.pool.read(), f.user.id).await.unwrap(), 50);

        let live = BillingRepository::find_live_subscription(f.pool.read(), f.user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(live.status(), SubscriptionStatus::Active);
        assert_eq!(
            BillingRepository::list_invoices(f.pool.read(), f.user.id).await.unwrap().len(),
            1
        );

        // A live subscription blocks a second checkout
        let err = f.billing.checkout(f.user.id, checkout(None)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_pending_checkout_blocks_second_checkout() {
        let f = fixture().await;
        promo(&f.pool, "BONUS", None, 30, None).await;

        let first = f.billing.checkout(f.user.id, checkout(Some("BONUS"))).await.unwrap();
        assert_eq!(first.subscription.status(), SubscriptionStatus::Incomplete);

        let err = f.billing.checkout(f.user.id, checkout(Some("BONUS"))).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
        assert_eq!(f.payments.subscriptions.lock().unwrap().len(), 1);
        assert_eq!(TokenBalanceRepository::get(f.pool.read(), f.user.id).await.unwrap(), 30);

        let code = PromotionalCodeRepository::find_by_code(f.pool.read(), "BONUS")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(code.redemptions, 1);
    }

    #[tokio::test]
    async fn test_checkout_allowed_after_cancellation() {
        let f = fixture().await;
        let first = f.billing.checkout(f.user.id, checkout(None)).await.unwrap();
        BillingRepository::set_subscription_status(
            f.pool.write(),
            &first.subscription.stripe_subscription_id,
            SubscriptionStatus::Canceled,
        )
        .await
        .unwrap();

        f.billing.checkout(f.user.id, checkout(None)).await.unwrap();
        assert_eq!(f.payments.subscriptions.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_late_invoice_does_not_revive_deleted_subscription() {
        let f = fixture().await;
        let session = f.billing.checkout(f.user.id, checkout(None)).await.unwrap();
        let sub_id = session.subscription.stripe_subscription_id.clone();
        let customer = UserRepository::get(f.pool.read(), f.user.id)
            .await
            .unwrap()
            .stripe_customer_id
            .unwrap();

        let (payload, header) = signed(serde_json::json!({
            "id": "evt_del",
            "type": "customer.subscription.deleted",
            "data": { "object": {
                "id": sub_id,
                "status": "canceled",
                "items": { "data": [ { "price": { "id": f.plan.stripe_price_id } } ] }
            }}
        }));
        assert!(f.billing.handle_webhook(&payload, Some(&header)).await.unwrap().processed);

        let (payload, header) = signed(invoice_paid_event("evt_paid", "in_late", &sub_id, &customer));
        assert!(f.billing.handle_webhook(&payload, Some(&header)).await.unwrap().processed);

        let sub = BillingRepository::find_subscription_by_stripe_id(f.pool.read(), &sub_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.status(), SubscriptionStatus::Canceled);
    }

    #[tokio::test]
    async fn test_tampered_webhook_rejected() {
        let f = fixture().await;
        let (mut payload, header) = signed(invoice_paid_event("evt_1", "in_1", "sub_1", "cus_x"));
        payload.extend_from_slice(b" ");

        let err = f.billing.handle_webhook(&payload, Some(&header)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidWebhookSignature));
        let err = f.billing.handle_webhook(&payload, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidWebhookSignature));
    }

    #[tokio::test]
    async fn test_subscription_deleted_and_payment_events() {
        let f = fixture().await;
        let session = f.billing.checkout(f.user.id, checkout(None)).await.unwrap();
        let sub_id = session.subscription.stripe_subscription_id.clone();

        let (payload, header) = signed(serde_json::json!({
            "id": "evt_2",
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_1", "amount": 990, "currency": "eur" } }
        }));
        assert!(f.billing.handle_webhook(&payload, Some(&header)).await.unwrap().processed);
        let payment = BillingRepository::find_payment_by_intent(f.pool.read(), "pi_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.status(), PaymentStatus::Succeeded);

        let (payload, header) = signed(serde_json::json!({
            "id": "evt_3",
            "type": "customer.subscription.deleted",
            "data": { "object": {
                "id": sub_id,
                "status": "canceled",
                "items": { "data": [ { "price": { "id": f.plan.stripe_price_id } } ] }
            }}
        }));
        assert!(f.billing.handle_webhook(&payload, Some(&header)).await.unwrap().processed);
        let sub = BillingRepository::find_subscription_by_stripe_id(f.pool.read(), &sub_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.status(), SubscriptionStatus::Canceled);
    }

    #[tokio::test]
    async fn test_unknown_event_ignored() {
        let f = fixture().await;
        let (payload, header) = signed(serde_json::json!({
            "id": "evt_9",
            "type": "charge.refunded",
            "data": { "object": {} }
        }));
        let outcome = f.billing.handle_webhook(&payload, Some(&header)).await.unwrap();
        assert!(!outcome.processed);
        assert_eq!(outcome.event_type, "charge.refunded");
    }

    #[tokio::test]
    async fn test_cancel_requires_live_subscription() {
        let f = fixture().await;
        let err = f.billing.cancel(f.user.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));

        let session = f.billing.checkout(f.user.id, checkout(None)).await.unwrap();
        BillingRepository::set_subscription_status(
            f.pool.write(),
            &session.subscription.stripe_subscription_id,
            SubscriptionStatus::Active,
        )
        .await
        .unwrap();

        let canceled = f.billing.cancel(f.user.id).await.unwrap();
        assert!(canceled.cancel_at_period_end);
        assert_eq!(f.payments.canceled.lock().unwrap().len(), 1);
    }
}
