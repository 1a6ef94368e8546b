mod common;

use chrono::{NaiveDate, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;
use relay_core::CoreError;
use relay_shared::{DeliveryFilter, DeliveryStatus, Principal, Role};

use common::{world, World};

/// Company creates five deliveries: courier A completes two, keeps one in
/// transit and cancels one. The fifth is left open.
async fn busy_week(w: &World) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(w.create_delivery().await.0);
    }
    let a = &w.courier_a.principal;
    for id in &ids[..2] {
        w.orchestrator.update_status(*id, "in_transit", a).await.unwrap();
        w.orchestrator.update_status(*id, "delivered", a).await.unwrap();
    }
    w.orchestrator.update_status(ids[2], "in_transit", a).await.unwrap();
    w.orchestrator.update_status(ids[3], "cancelled", a).await.unwrap();
    ids
}

#[tokio::test]
async fn test_listing_is_scoped_by_role() {
    let w = world().await;
    let ids = busy_week(&w).await;
    w.orchestrator
        .update_status(ids[4], "in_transit", &w.courier_b.principal)
        .await
        .unwrap();
    let all = DeliveryFilter::default();

    let company = w.orchestrator.list(&all, 1, 20, &w.company.principal).await.unwrap();
    assert_eq!(company.total, 5);
    assert_eq!(company.items[0].company_name, "Padaria Aurora");

    let admin = Principal::new(w.admins[0], Role::Admin);
    assert_eq!(w.orchestrator.list(&all, 1, 20, &admin).await.unwrap().total, 5);

    let courier_a = w.orchestrator.list(&all, 1, 20, &w.courier_a.principal).await.unwrap();
    assert_eq!(courier_a.total, 4);
    assert!(courier_a
        .items
        .iter()
        .all(|item| item.delivery.courier_id == Some(w.courier_a.record.id)));

    let courier_b = w.orchestrator.list(&all, 1, 20, &w.courier_b.principal).await.unwrap();
    assert_eq!(courier_b.total, 1);

    let rival_user = Uuid::new_v4();
    w.store.add_company(rival_user, "Sorveteria Polo Norte", None).await;
    let rival = Principal::new(rival_user, Role::Company);
    assert_eq!(w.orchestrator.list(&all, 1, 20, &rival).await.unwrap().total, 0);
}

#[tokio::test]
async fn test_open_deliveries_are_visible_to_every_courier() {
    let w = world().await;
    let (id, _) = w.create_delivery().await;

    let page = w
        .orchestrator
        .list(&DeliveryFilter::default(), 1, 20, &w.courier_b.principal)
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].delivery.id, id);
    assert_eq!(page.items[0].delivery.status, DeliveryStatus::Pending);
}

#[tokio::test]
async fn test_listing_filters_and_pages() {
    let w = world().await;
    let ids = busy_week(&w).await;
    let company = &w.company.principal;

    let completed = w
        .orchestrator
        .list(&DeliveryFilter::with_status(DeliveryStatus::Completed), 1, 20, company)
        .await
        .unwrap();
    assert_eq!(completed.total, 2);
    assert!(completed.items.iter().all(|i| i.delivery.completed_at.is_some()));

    let code = w.store.delivery(ids[2]).await.unwrap().code;
    let by_code = DeliveryFilter { code: Some(code[3..].to_lowercase()), ..DeliveryFilter::default() };
    let found = w.orchestrator.list(&by_code, 1, 20, company).await.unwrap();
    assert!(found.items.iter().any(|i| i.delivery.id == ids[2]));

    let by_city = DeliveryFilter {
        client_city: Some("recif".to_string()),
        is_fragile: Some(true),
        max_price: Some(dec!(8.60)),
        ..DeliveryFilter::default()
    };
    assert_eq!(w.orchestrator.list(&by_city, 1, 20, company).await.unwrap().total, 5);

    let too_expensive = DeliveryFilter { min_price: Some(dec!(8.61)), ..DeliveryFilter::default() };
    assert_eq!(w.orchestrator.list(&too_expensive, 1, 20, company).await.unwrap().total, 0);

    let second = w.orchestrator.list(&DeliveryFilter::default(), 2, 3, company).await.unwrap();
    assert_eq!((second.total, second.total_pages, second.items.len()), (5, 2, 2));

    let first = w.orchestrator.list(&DeliveryFilter::default(), 1, 3, company).await.unwrap();
    let created: Vec<_> = first.items.iter().chain(&second.items).map(|i| i.delivery.created_at).collect();
    let newest_first = {
        let mut sorted = created.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        sorted
    };
    assert_eq!(created, newest_first);

    let err = w
        .orchestrator
        .list(&DeliveryFilter::default(), u64::MAX, 20, company)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));
}

#[tokio::test]
async fn test_courier_stats() {
    let w = world().await;
    busy_week(&w).await;
    let wallet = w.wallet();
    let owner = w.courier_a.record.user_id;

    let stats = wallet.stats(owner, &w.courier_a.principal).await.unwrap();
    assert_eq!(stats.total_deliveries, 4);
    assert_eq!(stats.completed_deliveries, 2);
    assert_eq!(stats.pending_deliveries, 1);
    assert_eq!(stats.cancelled_deliveries, 1);
    assert_eq!(stats.total_earnings, dec!(17.20));
    assert_eq!(stats.current_balance, dec!(17.20));

    assert_eq!(stats.monthly_stats.len(), 1);
    let month = &stats.monthly_stats[0];
    assert_eq!(month.month, Utc::now().format("%Y-%m").to_string());
    assert_eq!(month.deliveries, 4);
    assert_eq!(month.earnings, dec!(17.20));

    let admin = Principal::new(w.admins[0], Role::Admin);
    assert_eq!(wallet.stats(owner, &admin).await.unwrap(), stats);

    let err = wallet.stats(owner, &w.courier_b.principal).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    let err = wallet.stats(Uuid::new_v4(), &admin).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    let idle = wallet.stats(w.courier_b.record.user_id, &w.courier_b.principal).await.unwrap();
    assert_eq!(idle.total_deliveries, 0);
    assert!(idle.monthly_stats.is_empty());
}

#[tokio::test]
async fn test_courier_report_for_current_week() {
    let w = world().await;
    busy_week(&w).await;
    let wallet = w.wallet();
    let owner = w.courier_a.record.user_id;

    let report = wallet.reports(owner, None, None, &w.courier_a.principal).await.unwrap();
    assert!(report.start <= Utc::now() && Utc::now() <= report.end);
    assert_eq!(report.summary.total_deliveries, 4);
    assert_eq!(report.summary.completed_deliveries, 2);
    assert_eq!(report.summary.pending_deliveries, 1);
    assert_eq!(report.summary.cancelled_deliveries, 1);
    assert_eq!(report.summary.total_earnings, dec!(17.20));

    assert_eq!(report.weekly_stats.len(), 7);
    let per_day: u64 = report.weekly_stats.iter().map(|d| d.total_deliveries).sum();
    let per_slot: u64 = report.weekly_stats.iter().flat_map(|d| d.hourly_data).sum();
    assert_eq!((per_day, per_slot), (4, 4));

    let item = &report.deliveries[0];
    assert_eq!(item.customer_name, "Padaria Aurora");
    assert_eq!(item.description, "ring the bell");
    assert!(item.address.starts_with("Rua da Aurora, 100 - Recife"));
}

#[tokio::test]
async fn test_courier_report_range_rules() {
    let w = world().await;
    busy_week(&w).await;
    let wallet = w.wallet();
    let owner = w.courier_a.record.user_id;
    let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);

    let past = wallet
        .reports(owner, day(2020, 1, 5), day(2020, 1, 11), &w.courier_a.principal)
        .await
        .unwrap();
    assert!(past.deliveries.is_empty());
    assert_eq!(past.summary.total_deliveries, 0);

    let err = wallet
        .reports(owner, day(2020, 1, 11), day(2020, 1, 5), &w.courier_a.principal)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));

    let err = wallet
        .reports(owner, None, None, &w.company.principal)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
}
