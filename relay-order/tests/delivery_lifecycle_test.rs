mod common;

use std::time::Duration;

use rust_decimal_macros::dec;
use uuid::Uuid;
use relay_core::CoreError;
use relay_shared::{DeliveryStatus, ExtractKind, NotificationKind, Principal, Role};

use common::{draft, is_delivery_code, world, world_with};

#[tokio::test]
async fn test_bike_scenario_end_to_end() {
    let w = world().await;

    let simulation = w.orchestrator.simulate(&draft(), &w.company.principal).await.unwrap();
    assert_eq!(simulation.price, dec!(8.60));
    assert_eq!(simulation.location.distance_meters, 3000);

    let (id, code) = w.create_delivery().await;
    assert!(is_delivery_code(&code), "unexpected code {}", code);
    assert!(code.starts_with("RD-"));

    let claimed = w.orchestrator.update_status(id, "in_transit", &w.courier_a.principal).await.unwrap();
    assert_eq!(claimed.status, "in_transit");

    let err = w.orchestrator.update_status(id, "in_transit", &w.courier_b.principal).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    let delivered = w.orchestrator.update_status(id, "delivered", &w.courier_a.principal).await.unwrap();
    assert_eq!(delivered.status, "delivered");
    assert!(delivered.delivered_at.is_some());
    assert_eq!(w.balance_of(&w.courier_a).await, dec!(8.60));
    assert_eq!(w.balance_of(&w.courier_b).await, dec!(0));
}

#[tokio::test]
async fn test_created_delivery_is_pending_and_stored_with_addresses() {
    let w = world().await;
    let created = w.orchestrator.create(&draft(), &w.company.principal).await.unwrap();

    let detail = w.orchestrator.find_by_code(&created.code.to_lowercase(), &w.company.principal).await.unwrap();
    assert_eq!(detail.delivery.status, DeliveryStatus::Pending);
    assert_eq!(detail.delivery.courier_id, None);
    assert_eq!(detail.delivery.price, dec!(8.60));
    assert_eq!(detail.delivery.package.information, "ring the bell");
    assert_eq!(detail.origin.parts.street, "Avenida Boa Viagem");
    assert_eq!(detail.destination.parts.street, "Rua da Aurora");
    assert_eq!(detail.company_name, "Padaria Aurora");
    assert!(detail.company_address.unwrap().starts_with("Rua do Bom Jesus, 100"));
}

#[tokio::test]
async fn test_find_by_code_is_scoped_to_requesting_company() {
    let w = world().await;
    let (_, code) = w.create_delivery().await;

    let other_user = Uuid::new_v4();
    w.store.add_company(other_user, "Outra Loja", None).await;
    let other = Principal::new(other_user, Role::Company);

    let err = w.orchestrator.find_by_code(&code, &other).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_company_address_as_origin() {
    let w = world().await;
    let mut d = draft();
    d.use_company_address = true;
    d.address = None;

    let created = w.orchestrator.create(&d, &w.company.principal).await.unwrap();
    let detail = w.orchestrator.find_by_code(&created.code, &w.company.principal).await.unwrap();
    assert_eq!(detail.origin.parts.street, "Rua do Bom Jesus");
    assert_ne!(Some(detail.origin.id), w.company.record.address_id);

    let homeless_user = Uuid::new_v4();
    w.store.add_company(homeless_user, "Sem Endereco", None).await;
    let err = w
        .orchestrator
        .simulate(&d, &Principal::new(homeless_user, Role::Company))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_draft_validation() {
    let w = world().await;

    let mut heavy = draft();
    heavy.weight_kg = dec!(40);
    let err = w.orchestrator.simulate(&heavy, &w.company.principal).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(ref msg) if msg.contains("weight")));

    let mut no_origin = draft();
    no_origin.address = None;
    let err = w.orchestrator.create(&no_origin, &w.company.principal).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));

    let mut rocket = draft();
    rocket.vehicle_type = "rocket".to_string();
    let err = w.orchestrator.simulate(&rocket, &w.company.principal).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    let err = w.orchestrator.simulate(&draft(), &w.courier_a.principal).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
    assert!(w.store.deliveries().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_have_one_winner() {
    for _ in 0..10 {
        let w = world().await;
        let (id, _) = w.create_delivery().await;

        let claim = |principal: Principal| {
            let orchestrator = w.orchestrator.clone();
            tokio::spawn(async move { orchestrator.update_status(id, "in_transit", &principal).await })
        };
        let a = claim(w.courier_a.principal);
        let b = claim(w.courier_b.principal);
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        let winner = match (&a, &b) {
            (Ok(_), Err(CoreError::Forbidden(_))) => w.courier_a.record.id,
            (Err(CoreError::Forbidden(_)), Ok(_)) => w.courier_b.record.id,
            other => panic!("expected exactly one winner, got {:?}", other),
        };

        let stored = w.store.delivery(id).await.unwrap();
        assert_eq!(stored.status, DeliveryStatus::InProgress);
        assert_eq!(stored.courier_id, Some(winner));
    }
}

#[tokio::test]
async fn test_completion_credits_courier_and_notifies_active_admins() {
    let w = world_with(2, 1).await;
    let (id, code) = w.create_delivery().await;

    w.orchestrator.update_status(id, "in_progress", &w.courier_a.principal).await.unwrap();
    w.orchestrator.update_status(id, "completed", &w.courier_a.principal).await.unwrap();

    assert_eq!(w.balance_of(&w.courier_a).await, dec!(8.60));

    let extracts = w.store.extracts(w.courier_a.record.user_id).await;
    assert_eq!(extracts.len(), 1);
    assert_eq!(extracts[0].kind, ExtractKind::Credit);
    assert_eq!(extracts[0].amount, dec!(8.60));
    assert!(extracts[0].description.contains(&code));

    assert_eq!(w.store.notification_count().await, 2);
    for admin in &w.admins {
        let inbox = w.store.notifications_for(*admin).await;
        assert_eq!(inbox.len(), 1);
        let notice = &inbox[0];
        assert_eq!(notice.kind, NotificationKind::Info);
        assert!(notice.is_read());
        assert!(!notice.requires_action);
        assert_eq!(notice.message, format!("Joana completed delivery {} for 8.60", code));
    }
}

#[tokio::test]
async fn test_repeated_completion_is_a_noop() {
    let w = world().await;
    let (id, _) = w.create_delivery().await;

    w.orchestrator.update_status(id, "in_transit", &w.courier_a.principal).await.unwrap();
    let first = w.orchestrator.update_status(id, "delivered", &w.courier_a.principal).await.unwrap();
    let second = w.orchestrator.update_status(id, "completed", &w.courier_a.principal).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(w.balance_of(&w.courier_a).await, dec!(8.60));
    assert_eq!(w.store.extracts(w.courier_a.record.user_id).await.len(), 1);
    assert_eq!(w.store.notification_count().await, 2);
}

#[tokio::test]
async fn test_missing_balance_rolls_back_completion() {
    let w = world().await;
    let (id, _) = w.create_delivery().await;

    w.orchestrator.update_status(id, "in_transit", &w.courier_a.principal).await.unwrap();
    w.store.remove_balance(w.courier_a.record.user_id).await;

    let err = w.orchestrator.update_status(id, "delivered", &w.courier_a.principal).await.unwrap_err();
    assert!(matches!(err, CoreError::Fatal(_)));

    let stored = w.store.delivery(id).await.unwrap();
    assert_eq!(stored.status, DeliveryStatus::InProgress);
    assert_eq!(stored.completed_at, None);
    assert!(w.store.extracts(w.courier_a.record.user_id).await.is_empty());
    assert_eq!(w.store.notification_count().await, 0);
}

#[tokio::test]
async fn test_transition_rules_through_orchestrator() {
    let w = world().await;
    let (id, _) = w.create_delivery().await;

    let err = w.orchestrator.update_status(id, "shipped", &w.courier_a.principal).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));

    let err = w.orchestrator.update_status(id, "delivered", &w.courier_a.principal).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    let err = w.orchestrator.update_status(id, "in_transit", &w.company.principal).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    let err = w.orchestrator.update_status(Uuid::new_v4(), "in_transit", &w.courier_a.principal).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    w.orchestrator.update_status(id, "in_transit", &w.courier_a.principal).await.unwrap();
    let err = w.orchestrator.update_status(id, "cancelled", &w.courier_b.principal).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));

    let canceled = w.orchestrator.update_status(id, "canceled", &w.courier_a.principal).await.unwrap();
    assert_eq!(canceled.status, "cancelled");

    let err = w.orchestrator.update_status(id, "in_transit", &w.courier_a.principal).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
    assert_eq!(w.balance_of(&w.courier_a).await, dec!(0));
}

#[tokio::test(start_paused = true)]
async fn test_simulation_is_cached_until_ttl_expires() {
    let w = world().await;

    let first = w.orchestrator.simulate(&draft(), &w.company.principal).await.unwrap();
    assert_eq!(w.locator.resolves(), 2);

    let second = w.orchestrator.simulate(&draft(), &w.company.principal).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(w.locator.resolves(), 2);

    tokio::time::advance(Duration::from_secs(3601)).await;

    let third = w.orchestrator.simulate(&draft(), &w.company.principal).await.unwrap();
    assert_eq!(first, third);
    assert_eq!(w.locator.resolves(), 4);
}
