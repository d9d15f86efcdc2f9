//! End-to-end cap, trial and suppression scenarios for the delivery engine.

mod common;

use common::{engine, engine_with_senders, memory_pool, seed_client, seed_hot_leads};
use leadflow::billing;
use leadflow::db::handlers::{Deliveries, Suppressions};
use leadflow::delivery::senders::testing::MockSender;
use leadflow::delivery::{DeliveryOutcome, DeliveryStatus};
use leadflow::metrics::{CounterFamily, DeliveryMetrics};
use leadflow::types::DeliveryMethod;
use std::sync::Arc;

fn delivered(outcomes: &[DeliveryOutcome]) -> usize {
    outcomes
        .iter()
        .filter(|o| o.status == DeliveryStatus::Delivered)
        .count()
}

fn with_reason<'a>(outcomes: &'a [DeliveryOutcome], reason: &str) -> Vec<&'a DeliveryOutcome> {
    outcomes
        .iter()
        .filter(|o| o.reason.as_deref() == Some(reason))
        .collect()
}

#[tokio::test]
async fn starter_subscription_caps_at_fifty_across_channels() {
    let pool = memory_pool().await;
    let metrics = DeliveryMetrics::new().unwrap();
    let engine = engine(&pool, &metrics);

    let client = seed_client(&pool, "Sub_Starter", "restaurants", Some("+1000000000")).await;
    billing::update_subscription(&pool, client.id, "starter", Some(1), "paid")
        .await
        .unwrap();
    seed_hot_leads(&pool, "restaurants", 600).await;

    let whatsapp = engine.deliver_whatsapp(client.id, &[]).await.unwrap();
    let email = engine.deliver_email(client.id, &[], None).await.unwrap();

    assert_eq!(whatsapp.len(), 600);
    assert_eq!(email.len(), 600);
    assert_eq!(delivered(&whatsapp) + delivered(&email), 50);
    // The remainder of the first pass hit the subscription cap; the whole
    // second pass does, because counts are re-read per invocation.
    assert_eq!(with_reason(&whatsapp, "cap_reached_subscription").len(), 550);
    assert_eq!(with_reason(&email, "cap_reached_subscription").len(), 600);

    // The cap invariant holds in the store, not just in the outcomes.
    let stored = Deliveries::list_for_client(&pool, client.id).await.unwrap();
    assert_eq!(stored.len(), 50);

    // Discounted starter price on the basic tier: 15 * (1 - 0.4).
    for outcome in whatsapp.iter().filter(|o| o.status == DeliveryStatus::Delivered) {
        assert_eq!(outcome.price, Some(9.0));
    }

    assert_eq!(
        metrics.value(CounterFamily::Delivered, client.id, DeliveryMethod::WhatsApp, "restaurants"),
        50
    );
    assert_eq!(
        metrics.value(CounterFamily::SkippedCap, client.id, DeliveryMethod::Email, "restaurants"),
        600
    );
}

#[tokio::test]
async fn pay_per_lead_caps_at_the_tier_limit() {
    let pool = memory_pool().await;
    let metrics = DeliveryMetrics::new().unwrap();
    let engine = engine(&pool, &metrics);

    let client = seed_client(&pool, "PPL_Fitness", "fitness", Some("+2000000000")).await;
    billing::record_payment(&pool, client.id, Some("ppl"), 0.0, "paid")
        .await
        .unwrap();
    seed_hot_leads(&pool, "fitness", 300).await;

    let whatsapp = engine.deliver_whatsapp(client.id, &[]).await.unwrap();
    let email = engine.deliver_email(client.id, &[], None).await.unwrap();

    // fitness is the mid tier: cap 100, base price 45, no discount.
    assert_eq!(delivered(&whatsapp) + delivered(&email), 100);
    assert_eq!(with_reason(&whatsapp, "cap_reached_ppl").len(), 200);
    assert_eq!(with_reason(&email, "cap_reached_ppl").len(), 300);
    for outcome in whatsapp.iter().filter(|o| o.status == DeliveryStatus::Delivered) {
        assert_eq!(outcome.price, Some(45.0));
    }

    let stored = Deliveries::list_for_client(&pool, client.id).await.unwrap();
    assert_eq!(stored.len(), 100);
}

#[tokio::test]
async fn client_without_plan_or_payment_is_inactive() {
    let pool = memory_pool().await;
    let metrics = DeliveryMetrics::new().unwrap();
    let engine = engine(&pool, &metrics);

    let client = seed_client(&pool, "Dormant", "salons", Some("+3000000000")).await;
    seed_hot_leads(&pool, "salons", 10).await;

    let outcomes = engine.deliver_whatsapp(client.id, &[]).await.unwrap();
    assert_eq!(outcomes.len(), 10);
    assert_eq!(with_reason(&outcomes, "inactive").len(), 10);
    assert!(Deliveries::list_for_client(&pool, client.id).await.unwrap().is_empty());
    assert_eq!(
        metrics.value(CounterFamily::SkippedInactive, client.id, DeliveryMethod::WhatsApp, "salons"),
        10
    );
}

#[tokio::test]
async fn trial_pack_prices_ten_leads_at_zero_then_pay_per_lead() {
    let pool = memory_pool().await;
    let metrics = DeliveryMetrics::new().unwrap();
    let engine = engine(&pool, &metrics);

    let client = seed_client(&pool, "Trial_RE", "real_estate", Some("+4000000000")).await;
    billing::record_payment(&pool, client.id, Some("trial"), 49.0, "paid")
        .await
        .unwrap();
    let leads = seed_hot_leads(&pool, "real_estate", 15).await;

    let outcomes = engine.deliver_whatsapp(client.id, &leads).await.unwrap();
    assert_eq!(delivered(&outcomes), 15);

    let prices: Vec<f64> = outcomes.iter().map(|o| o.price.unwrap()).collect();
    assert!(prices[..10].iter().all(|p| *p == 0.0));
    // real_estate is mid tier: the overflow pays the 45 base price.
    assert!(prices[10..].iter().all(|p| *p == 45.0));

    assert_eq!(
        metrics.value(CounterFamily::TrialUsed, client.id, DeliveryMethod::WhatsApp, "real_estate"),
        10
    );

    // A second invocation re-reads the trial-used count from the store and
    // grants no further free leads.
    let more = seed_hot_leads(&pool, "real_estate", 2).await;
    let outcomes = engine.deliver_whatsapp(client.id, &more).await.unwrap();
    assert!(outcomes.iter().all(|o| o.price == Some(45.0)));
}

#[tokio::test]
async fn opted_out_target_never_produces_a_delivery() {
    let pool = memory_pool().await;
    let metrics = DeliveryMetrics::new().unwrap();
    let engine = engine(&pool, &metrics);

    let client = seed_client(&pool, "Respectful", "cleaning", None).await;
    billing::record_payment(&pool, client.id, Some("ppl"), 0.0, "paid")
        .await
        .unwrap();
    let leads = seed_hot_leads(&pool, "cleaning", 3).await;

    // Lead 0's email and lead 1's phone are suppressed; the client has no
    // whatsapp number so the whatsapp target falls back to the lead phone.
    Suppressions::add_opt_out(&pool, DeliveryMethod::Email, "0@cleaning.example.com")
        .await
        .unwrap();
    Suppressions::add_opt_out(&pool, DeliveryMethod::WhatsApp, "+10000001")
        .await
        .unwrap();

    let email = engine.deliver_email(client.id, &leads, None).await.unwrap();
    assert_eq!(with_reason(&email, "opt_out").len(), 1);
    assert_eq!(email[0].status, DeliveryStatus::Skipped);
    assert_eq!(delivered(&email), 2);

    let whatsapp = engine.deliver_whatsapp(client.id, &leads).await.unwrap();
    assert_eq!(with_reason(&whatsapp, "opt_out").len(), 1);

    // No stored delivery for either suppressed pairing.
    let stored = Deliveries::list_for_client(&pool, client.id).await.unwrap();
    assert_eq!(stored.len(), 4);
    assert!(!stored
        .iter()
        .any(|d| d.qualified_lead_id == leads[0] && d.delivery_method == DeliveryMethod::Email));
    assert!(!stored
        .iter()
        .any(|d| d.qualified_lead_id == leads[1] && d.delivery_method == DeliveryMethod::WhatsApp));
}

#[tokio::test]
async fn send_failure_records_a_bounce_and_continues() {
    let pool = memory_pool().await;
    let metrics = DeliveryMetrics::new().unwrap();
    // The email sender rejects lead 1's address; everything else succeeds.
    let engine = engine_with_senders(
        &pool,
        &metrics,
        Arc::new(MockSender::failing_on(&["1@plumbing.example.com"])),
        Arc::new(MockSender::default()),
    );

    let client = seed_client(&pool, "Bouncy", "plumbing", None).await;
    billing::record_payment(&pool, client.id, Some("ppl"), 0.0, "paid")
        .await
        .unwrap();
    let leads = seed_hot_leads(&pool, "plumbing", 3).await;

    let outcomes = engine.deliver_email(client.id, &leads, None).await.unwrap();
    assert_eq!(delivered(&outcomes), 2);
    let failed: Vec<_> = outcomes
        .iter()
        .filter(|o| o.status == DeliveryStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].reason.as_deref().unwrap().starts_with("error:"));

    let bounces = Suppressions::bounces(&pool).await.unwrap();
    assert_eq!(bounces.len(), 1);
    assert_eq!(bounces[0].target, "1@plumbing.example.com");
    assert_eq!(bounces[0].method, "email");

    // The failed lead has no stored delivery and can be retried later.
    let stored = Deliveries::list_for_client(&pool, client.id).await.unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn repeat_invocations_are_idempotent_per_channel() {
    let pool = memory_pool().await;
    let metrics = DeliveryMetrics::new().unwrap();
    let engine = engine(&pool, &metrics);

    let client = seed_client(&pool, "Repeat", "restaurants", Some("+5000000000")).await;
    billing::update_subscription(&pool, client.id, "pro", None, "paid")
        .await
        .unwrap();
    let leads = seed_hot_leads(&pool, "restaurants", 5).await;

    engine.deliver_whatsapp(client.id, &leads).await.unwrap();
    engine.deliver_whatsapp(client.id, &leads).await.unwrap();

    // The UNIQUE key keeps the store at one row per (lead, client, channel).
    let stored = Deliveries::list_for_client(&pool, client.id).await.unwrap();
    assert_eq!(stored.len(), 5);

    // Dashboard deliveries share the same idempotency discipline.
    let first = engine
        .record_dashboard_delivery(leads[0], client.id)
        .await
        .unwrap()
        .unwrap();
    let replay = engine
        .record_dashboard_delivery(leads[0], client.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, replay);
    assert_eq!(
        Deliveries::list_for_client(&pool, client.id).await.unwrap().len(),
        6
    );
}

#[tokio::test]
async fn deleted_client_gets_an_empty_outcome() {
    let pool = memory_pool().await;
    let metrics = DeliveryMetrics::new().unwrap();
    let engine = engine(&pool, &metrics);

    let client = seed_client(&pool, "Ghost", "law", None).await;
    billing::record_payment(&pool, client.id, Some("ppl"), 0.0, "paid")
        .await
        .unwrap();
    seed_hot_leads(&pool, "law", 3).await;

    let mut conn = pool.acquire().await.unwrap();
    use leadflow::db::handlers::Repository;
    leadflow::db::handlers::Clients::new(&mut conn)
        .delete(client.id)
        .await
        .unwrap();
    drop(conn);

    assert!(engine.deliver_whatsapp(client.id, &[]).await.unwrap().is_empty());
    assert!(engine.deliver_whatsapp(9999, &[]).await.unwrap().is_empty());
}
