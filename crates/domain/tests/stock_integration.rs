//! Integration tests for the stock-affecting transactions.
//!
//! These tests run every operation against the in-memory document store and
//! check stock levels, stored records, and the activity log afterwards.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use common::DocumentId;
use document_store::{DocumentStore, InMemoryDocumentStore, RetryPolicy};
use domain::{
    ActivityAction, ActivityEntry, DomainError, Entity, FarmService, FixedClock, Fumigation,
    FumigationCompletion, FumigationProduct, FumigationStatus, Harvest, HarvestCompletion,
    HarvestInput, HarvestStatus, HarvestedProduct, NewFumigation, NewHarvest, NewProduct,
    NewTransfer, NoopActivityLogger, Product, ShortfallPolicy, StockPolicy, Transfer,
    TransferStatus, Weather,
};

/// Helper to create a test service with a fixed clock
fn create_service() -> FarmService<InMemoryDocumentStore> {
    FarmService::new(InMemoryDocumentStore::new()).with_clock(Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2024, 9, 15, 7, 45, 0).unwrap(),
    )))
}

async fn create_product(
    service: &FarmService<InMemoryDocumentStore>,
    name: &str,
    stock: f64,
) -> Product {
    service
        .create_product(NewProduct {
            name: name.to_string(),
            category: "agrochemical".to_string(),
            unit: "l".to_string(),
            stock,
            min_stock: 5.0,
            warehouse_id: Some(DocumentId::new("w1")),
            ..Default::default()
        })
        .await
        .unwrap()
}

async fn stock_of(service: &FarmService<InMemoryDocumentStore>, product: &Product) -> f64 {
    service.require::<Product>(&product.id).await.unwrap().stock
}

fn fumigation_line(product: &Product, total_quantity: f64) -> FumigationProduct {
    FumigationProduct {
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        total_quantity,
        dose_per_hectare: None,
    }
}

fn harvest_line(product: &Product, quantity: f64) -> HarvestInput {
    HarvestInput {
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        quantity,
    }
}

async fn schedule_fumigation(
    service: &FarmService<InMemoryDocumentStore>,
    lines: Vec<FumigationProduct>,
) -> Fumigation {
    service
        .create_fumigation(NewFumigation {
            field_id: Some(DocumentId::new("f1")),
            crop: Some("Soy".to_string()),
            total_surface: 25.0,
            selected_products: lines,
            ..Default::default()
        })
        .await
        .unwrap()
}

fn new_harvest(lines: Vec<HarvestInput>) -> NewHarvest {
    NewHarvest {
        field_id: Some(DocumentId::new("f1")),
        crop: "Wheat".to_string(),
        total_area: 30.0,
        estimated_yield: 90.0,
        selected_products: lines,
        ..Default::default()
    }
}

fn grain(name: &str, quantity: f64) -> HarvestedProduct {
    HarvestedProduct {
        name: name.to_string(),
        quantity,
        unit: "kg".to_string(),
        warehouse_id: Some(DocumentId::new("w2")),
        ..Default::default()
    }
}

mod fumigation_completion {
    use super::*;

    #[tokio::test]
    async fn deducts_each_product_and_completes() {
        let service = create_service();
        let glyphosate = create_product(&service, "Glyphosate", 100.0).await;
        let atrazine = create_product(&service, "Atrazine", 40.0).await;
        let fumigation = schedule_fumigation(
            &service,
            vec![
                fumigation_line(&glyphosate, 30.0),
                fumigation_line(&atrazine, 40.0),
            ],
        )
        .await;

        let completed = service
            .complete_fumigation(&fumigation.id, FumigationCompletion::default())
            .await
            .unwrap();

        assert_eq!(completed.fumigation.status, FumigationStatus::Completed);
        assert_eq!(completed.deductions.len(), 2);
        assert!(completed.shortfalls.is_empty());
        assert_eq!(stock_of(&service, &glyphosate).await, 70.0);
        assert_eq!(stock_of(&service, &atrazine).await, 0.0);

        let stored = service.require::<Fumigation>(&fumigation.id).await.unwrap();
        assert_eq!(stored.status, FumigationStatus::Completed);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn short_product_is_skipped_by_default() {
        let service = create_service();
        let glyphosate = create_product(&service, "Glyphosate", 100.0).await;
        let atrazine = create_product(&service, "Atrazine", 10.0).await;
        let fumigation = schedule_fumigation(
            &service,
            vec![
                fumigation_line(&glyphosate, 30.0),
                fumigation_line(&atrazine, 12.0),
            ],
        )
        .await;

        let completed = service
            .complete_fumigation(&fumigation.id, FumigationCompletion::default())
            .await
            .unwrap();

        assert_eq!(completed.fumigation.status, FumigationStatus::Completed);
        assert_eq!(completed.shortfalls.len(), 1);
        assert_eq!(completed.shortfalls[0].product_id, atrazine.id);
        assert_eq!(completed.shortfalls[0].available, 10.0);
        assert_eq!(stock_of(&service, &glyphosate).await, 70.0);
        assert_eq!(stock_of(&service, &atrazine).await, 10.0);
    }

    #[tokio::test]
    async fn missing_product_is_reported_as_shortfall() {
        let service = create_service();
        let fumigation = schedule_fumigation(
            &service,
            vec![FumigationProduct {
                product_id: DocumentId::new("gone"),
                product_name: "Discontinued".to_string(),
                total_quantity: 3.0,
                dose_per_hectare: None,
            }],
        )
        .await;

        let completed = service
            .complete_fumigation(&fumigation.id, FumigationCompletion::default())
            .await
            .unwrap();

        assert_eq!(completed.shortfalls[0].product_name, "Discontinued");
        assert_eq!(completed.shortfalls[0].available, 0.0);
    }

    #[tokio::test]
    async fn abort_policy_leaves_everything_untouched() {
        let service = create_service().with_policy(StockPolicy {
            fumigation_completion: ShortfallPolicy::Abort,
            ..StockPolicy::default()
        });
        let glyphosate = create_product(&service, "Glyphosate", 100.0).await;
        let atrazine = create_product(&service, "Atrazine", 10.0).await;
        let fumigation = schedule_fumigation(
            &service,
            vec![
                fumigation_line(&glyphosate, 30.0),
                fumigation_line(&atrazine, 12.0),
            ],
        )
        .await;

        let result = service
            .complete_fumigation(&fumigation.id, FumigationCompletion::default())
            .await;

        assert!(matches!(result, Err(DomainError::InsufficientStock { .. })));
        assert_eq!(stock_of(&service, &glyphosate).await, 100.0);
        let stored = service.require::<Fumigation>(&fumigation.id).await.unwrap();
        assert_eq!(stored.status, FumigationStatus::Pending);
    }

    #[tokio::test]
    async fn zero_quantity_lines_are_ignored() {
        let service = create_service();
        let glyphosate = create_product(&service, "Glyphosate", 1.0).await;
        let fumigation =
            schedule_fumigation(&service, vec![fumigation_line(&glyphosate, 0.0)]).await;

        let completed = service
            .complete_fumigation(&fumigation.id, FumigationCompletion::default())
            .await
            .unwrap();

        assert!(completed.deductions.is_empty());
        assert!(completed.shortfalls.is_empty());
        assert_eq!(stock_of(&service, &glyphosate).await, 1.0);
    }

    #[tokio::test]
    async fn completion_metadata_is_stored() {
        let service = create_service();
        let fumigation = schedule_fumigation(&service, vec![]).await;
        let start = Utc.with_ymd_and_hms(2024, 9, 15, 6, 0, 0).unwrap();

        service
            .complete_fumigation(
                &fumigation.id,
                FumigationCompletion {
                    start_time: Some(start),
                    end_time: Some(start + chrono::Duration::hours(2)),
                    weather: Some(Weather {
                        temperature: Some(18.0),
                        wind_speed: Some(7.5),
                        ..Default::default()
                    }),
                    notes: Some("Light wind from the south".to_string()),
                },
            )
            .await
            .unwrap();

        let stored = service.require::<Fumigation>(&fumigation.id).await.unwrap();
        assert_eq!(stored.start_time, Some(start));
        assert_eq!(stored.weather.unwrap().wind_speed, Some(7.5));
        assert_eq!(stored.notes.as_deref(), Some("Light wind from the south"));
        assert_eq!(stored.crop.as_deref(), Some("Soy"));
    }

    #[tokio::test]
    async fn completing_twice_deducts_twice() {
        let service = create_service();
        let glyphosate = create_product(&service, "Glyphosate", 100.0).await;
        let fumigation =
            schedule_fumigation(&service, vec![fumigation_line(&glyphosate, 30.0)]).await;

        service
            .complete_fumigation(&fumigation.id, FumigationCompletion::default())
            .await
            .unwrap();
        let second = service
            .complete_fumigation(&fumigation.id, FumigationCompletion::default())
            .await
            .unwrap();

        assert_eq!(second.deductions[0].previous_stock, 70.0);
        assert_eq!(stock_of(&service, &glyphosate).await, 40.0);
    }

    #[tokio::test]
    async fn cancelled_fumigation_can_be_completed() {
        let service = create_service();
        let glyphosate = create_product(&service, "Glyphosate", 100.0).await;
        let fumigation =
            schedule_fumigation(&service, vec![fumigation_line(&glyphosate, 30.0)]).await;
        service
            .update_status::<Fumigation>(&fumigation.id, FumigationStatus::Cancelled)
            .await
            .unwrap();

        let completed = service
            .complete_fumigation(&fumigation.id, FumigationCompletion::default())
            .await
            .unwrap();

        assert_eq!(completed.fumigation.status, FumigationStatus::Completed);
        assert_eq!(stock_of(&service, &glyphosate).await, 70.0);
    }

    #[tokio::test]
    async fn closed_fumigation_is_rejected_when_configured() {
        let service = create_service().with_policy(StockPolicy {
            reject_closed_completion: true,
            ..StockPolicy::default()
        });
        let glyphosate = create_product(&service, "Glyphosate", 100.0).await;
        let fumigation =
            schedule_fumigation(&service, vec![fumigation_line(&glyphosate, 30.0)]).await;

        service
            .complete_fumigation(&fumigation.id, FumigationCompletion::default())
            .await
            .unwrap();
        let second = service
            .complete_fumigation(&fumigation.id, FumigationCompletion::default())
            .await;

        assert!(matches!(
            second,
            Err(DomainError::InvalidStatusTransition { .. })
        ));
        assert_eq!(stock_of(&service, &glyphosate).await, 70.0);
    }

    #[tokio::test]
    async fn unknown_fumigation_is_not_found() {
        let service = create_service();
        let result = service
            .complete_fumigation(&DocumentId::new("nope"), FumigationCompletion::default())
            .await;
        assert!(matches!(
            result,
            Err(DomainError::NotFound {
                entity: "Fumigation",
                ..
            })
        ));
    }
}

mod harvest_creation {
    use super::*;

    #[tokio::test]
    async fn deducts_inputs_and_stores_harvest() {
        let service = create_service();
        let seed = create_product(&service, "Wheat seed", 200.0).await;
        let urea = create_product(&service, "Urea", 80.0).await;

        let created = service
            .create_harvest(new_harvest(vec![
                harvest_line(&seed, 150.0),
                harvest_line(&urea, 20.0),
            ]))
            .await
            .unwrap();

        assert_eq!(created.harvest.status, HarvestStatus::Pending);
        assert_eq!(created.deductions.len(), 2);
        assert_eq!(stock_of(&service, &seed).await, 50.0);
        assert_eq!(stock_of(&service, &urea).await, 60.0);

        let stored = service.require::<Harvest>(&created.harvest.id).await.unwrap();
        assert_eq!(stored, created.harvest);
    }

    #[tokio::test]
    async fn short_input_aborts_everything_by_default() {
        let service = create_service();
        let seed = create_product(&service, "Wheat seed", 200.0).await;
        let urea = create_product(&service, "Urea", 10.0).await;

        let result = service
            .create_harvest(new_harvest(vec![
                harvest_line(&seed, 150.0),
                harvest_line(&urea, 20.0),
            ]))
            .await;

        match result {
            Err(DomainError::InsufficientStock {
                product_id,
                requested,
                available,
                ..
            }) => {
                assert_eq!(product_id, urea.id);
                assert_eq!(requested, 20.0);
                assert_eq!(available, 10.0);
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }
        assert_eq!(stock_of(&service, &seed).await, 200.0);
        assert_eq!(stock_of(&service, &urea).await, 10.0);
        assert!(service.list::<Harvest>().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_input_is_not_found() {
        let service = create_service();
        let result = service
            .create_harvest(new_harvest(vec![HarvestInput {
                product_id: DocumentId::new("gone"),
                product_name: "Gone".to_string(),
                quantity: 1.0,
            }]))
            .await;

        assert!(matches!(
            result,
            Err(DomainError::NotFound {
                entity: "Product",
                ..
            })
        ));
        assert!(service.list::<Harvest>().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_lines_are_summed_before_checking() {
        let service = create_service();
        let seed = create_product(&service, "Wheat seed", 100.0).await;

        let result = service
            .create_harvest(new_harvest(vec![
                harvest_line(&seed, 60.0),
                harvest_line(&seed, 60.0),
            ]))
            .await;

        assert!(matches!(result, Err(DomainError::InsufficientStock { .. })));
        assert_eq!(stock_of(&service, &seed).await, 100.0);
    }

    #[tokio::test]
    async fn skip_policy_creates_harvest_despite_shortfall() {
        let service = create_service().with_policy(StockPolicy {
            harvest_creation: ShortfallPolicy::Skip,
            ..StockPolicy::default()
        });
        let seed = create_product(&service, "Wheat seed", 200.0).await;
        let urea = create_product(&service, "Urea", 10.0).await;

        let created = service
            .create_harvest(new_harvest(vec![
                harvest_line(&seed, 150.0),
                harvest_line(&urea, 20.0),
            ]))
            .await
            .unwrap();

        assert_eq!(created.shortfalls.len(), 1);
        assert_eq!(stock_of(&service, &seed).await, 50.0);
        assert_eq!(stock_of(&service, &urea).await, 10.0);
    }
}

mod harvest_completion {
    use super::*;

    #[tokio::test]
    async fn each_output_becomes_a_new_product() {
        let service = create_service();
        let harvest = service.create_harvest(new_harvest(vec![])).await.unwrap().harvest;
        let before = service.list::<Product>().await.unwrap().len();

        let completed = service
            .complete_harvest(
                &harvest.id,
                HarvestCompletion {
                    harvested_products: vec![grain("Grain A", 500.0)],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(completed.products.len(), 1);
        let products = service.list::<Product>().await.unwrap();
        assert_eq!(products.len(), before + 1);

        let product = service
            .require::<Product>(&completed.products[0].id)
            .await
            .unwrap();
        assert_eq!(product.name, "Grain A");
        assert_eq!(product.stock, 500.0);
        assert_eq!(product.unit, "kg");
        assert_eq!(product.category, "harvest");
        assert_eq!(product.harvest_id.as_ref(), Some(&harvest.id));
        let lot = product.lot_number.unwrap();
        assert!(lot.contains(harvest.id.prefix(8)));
    }

    #[tokio::test]
    async fn harvest_records_totals() {
        let service = create_service();
        let harvest = service.create_harvest(new_harvest(vec![])).await.unwrap().harvest;

        service
            .complete_harvest(
                &harvest.id,
                HarvestCompletion {
                    harvested_products: vec![grain("Grain A", 500.0), grain("Straw", 120.0)],
                    actual_yield: Some(85.0),
                    notes: Some("Dry conditions".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = service.require::<Harvest>(&harvest.id).await.unwrap();
        assert_eq!(stored.status, HarvestStatus::Completed);
        assert_eq!(stored.total_harvested, Some(620.0));
        assert_eq!(stored.actual_yield, Some(85.0));
        assert_eq!(stored.harvested_products.len(), 2);
        assert_eq!(stored.crop, "Wheat");
    }

    #[tokio::test]
    async fn completing_twice_duplicates_products() {
        let service = create_service();
        let harvest = service.create_harvest(new_harvest(vec![])).await.unwrap().harvest;
        let completion = HarvestCompletion {
            harvested_products: vec![grain("Grain A", 500.0)],
            ..Default::default()
        };

        let first = service
            .complete_harvest(&harvest.id, completion.clone())
            .await
            .unwrap();
        let second = service
            .complete_harvest(&harvest.id, completion)
            .await
            .unwrap();

        assert_ne!(first.products[0].id, second.products[0].id);
        let grains: Vec<Product> = service
            .list::<Product>()
            .await
            .unwrap()
            .into_iter()
            .filter(|p| p.name == "Grain A")
            .collect();
        assert_eq!(grains.len(), 2);
    }

    #[tokio::test]
    async fn cancelled_harvest_can_be_completed() {
        let service = create_service();
        let harvest = service.create_harvest(new_harvest(vec![])).await.unwrap().harvest;
        service
            .update_status::<Harvest>(&harvest.id, HarvestStatus::Cancelled)
            .await
            .unwrap();

        let completed = service
            .complete_harvest(
                &harvest.id,
                HarvestCompletion {
                    harvested_products: vec![grain("Grain A", 500.0)],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(completed.harvest.status, HarvestStatus::Completed);
        let product = service
            .require::<Product>(&completed.products[0].id)
            .await
            .unwrap();
        assert_eq!(product.stock, 500.0);
    }

    #[tokio::test]
    async fn cancelled_harvest_is_rejected_when_configured() {
        let service = create_service().with_policy(StockPolicy {
            reject_closed_completion: true,
            ..StockPolicy::default()
        });
        let harvest = service.create_harvest(new_harvest(vec![])).await.unwrap().harvest;
        service
            .update_status::<Harvest>(&harvest.id, HarvestStatus::Cancelled)
            .await
            .unwrap();

        let result = service
            .complete_harvest(
                &harvest.id,
                HarvestCompletion {
                    harvested_products: vec![grain("Grain A", 500.0)],
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(DomainError::InvalidStatusTransition { .. })
        ));
        assert!(
            service
                .list::<Product>()
                .await
                .unwrap()
                .iter()
                .all(|p| p.name != "Grain A")
        );
    }
}

mod transfers {
    use super::*;

    fn transfer_input(product: &Product, quantity: f64) -> NewTransfer {
        NewTransfer {
            product_id: product.id.clone(),
            quantity,
            source_warehouse_id: DocumentId::new("w1"),
            destination_warehouse_id: DocumentId::new("w2"),
            transfer_date: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn partial_transfer_splits_the_product() {
        let service = create_service();
        let urea = create_product(&service, "Urea", 100.0).await;
        let transfer = service
            .create_transfer(transfer_input(&urea, 30.0))
            .await
            .unwrap();

        let completed = service.complete_transfer(&transfer.id).await.unwrap();

        assert_eq!(completed.transfer.status, TransferStatus::Completed);
        assert_eq!(stock_of(&service, &urea).await, 70.0);
        let destination = service
            .require::<Product>(&completed.destination.id)
            .await
            .unwrap();
        assert_ne!(destination.id, urea.id);
        assert_eq!(destination.stock, 30.0);
        assert_eq!(destination.warehouse_id, Some(DocumentId::new("w2")));

        let stored = service.require::<Transfer>(&transfer.id).await.unwrap();
        assert_eq!(stored.destination_product_id, Some(destination.id));
    }

    #[tokio::test]
    async fn full_transfer_relocates_the_product() {
        let service = create_service();
        let urea = create_product(&service, "Urea", 40.0).await;
        let transfer = service
            .create_transfer(transfer_input(&urea, 40.0))
            .await
            .unwrap();

        let completed = service.complete_transfer(&transfer.id).await.unwrap();

        assert_eq!(completed.destination.id, urea.id);
        let stored = service.require::<Product>(&urea.id).await.unwrap();
        assert_eq!(stored.warehouse_id, Some(DocumentId::new("w2")));
        assert_eq!(stored.stock, 40.0);
    }

    #[tokio::test]
    async fn stock_consumed_after_request_fails_completion() {
        let service = create_service();
        let urea = create_product(&service, "Urea", 40.0).await;
        let transfer = service
            .create_transfer(transfer_input(&urea, 30.0))
            .await
            .unwrap();
        service.adjust_stock(&urea.id, -20.0, None).await.unwrap();

        let result = service.complete_transfer(&transfer.id).await;

        assert!(matches!(result, Err(DomainError::InsufficientStock { .. })));
        let stored = service.require::<Transfer>(&transfer.id).await.unwrap();
        assert_eq!(stored.status, TransferStatus::Pending);
    }

    #[tokio::test]
    async fn cancelled_transfer_cannot_complete() {
        let service = create_service();
        let urea = create_product(&service, "Urea", 40.0).await;
        let transfer = service
            .create_transfer(transfer_input(&urea, 10.0))
            .await
            .unwrap();
        service
            .update_status::<Transfer>(&transfer.id, TransferStatus::Cancelled)
            .await
            .unwrap();

        let result = service.complete_transfer(&transfer.id).await;

        assert!(matches!(
            result,
            Err(DomainError::InvalidStatusTransition { .. })
        ));
        assert_eq!(stock_of(&service, &urea).await, 40.0);
    }
}

mod stock_adjustment {
    use super::*;

    #[tokio::test]
    async fn adjustments_cannot_go_negative() {
        let service = create_service();
        let urea = create_product(&service, "Urea", 10.0).await;

        let adjustment = service
            .adjust_stock(&urea.id, 15.0, Some("delivery".to_string()))
            .await
            .unwrap();
        assert_eq!(adjustment.new_stock, 25.0);

        let result = service.adjust_stock(&urea.id, -30.0, None).await;
        assert!(matches!(result, Err(DomainError::InsufficientStock { .. })));
        assert_eq!(stock_of(&service, &urea).await, 25.0);
    }

    #[tokio::test]
    async fn low_stock_lists_most_depleted_first() {
        let service = create_service();
        create_product(&service, "Urea", 4.0).await;
        create_product(&service, "Atrazine", 1.0).await;
        create_product(&service, "Glyphosate", 50.0).await;

        let low = service.low_stock_products().await.unwrap();
        let names: Vec<_> = low.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Atrazine", "Urea"]);
    }

    #[tokio::test]
    async fn conflicts_are_retried() {
        let store = InMemoryDocumentStore::new();
        let service = FarmService::new(store.clone())
            .with_activity_logger(Arc::new(NoopActivityLogger))
            .with_policy(StockPolicy {
                retry: RetryPolicy::new(4, Duration::ZERO),
                ..StockPolicy::default()
            });
        let urea = create_product(&service, "Urea", 10.0).await;
        store.inject_conflicts(2);

        let adjustment = service.adjust_stock(&urea.id, -3.0, None).await.unwrap();

        assert_eq!(adjustment.new_stock, 7.0);
        assert_eq!(stock_of(&service, &urea).await, 7.0);
    }

    #[tokio::test]
    async fn concurrent_deductions_do_not_lose_updates() {
        let store = InMemoryDocumentStore::new();
        let service = Arc::new(
            FarmService::new(store.clone())
                .with_activity_logger(Arc::new(NoopActivityLogger))
                .with_policy(StockPolicy {
                    retry: RetryPolicy::new(50, Duration::from_millis(1)),
                    ..StockPolicy::default()
                }),
        );
        let urea = create_product(&service, "Urea", 100.0).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let service = Arc::clone(&service);
            let id = urea.id.clone();
            handles.push(tokio::spawn(async move {
                service.adjust_stock(&id, -5.0, None).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(stock_of(&service, &urea).await, 50.0);
    }
}

mod status_updates {
    use super::*;

    #[tokio::test]
    async fn fumigation_cannot_be_completed_by_status_update() {
        let service = create_service();
        let fumigation = schedule_fumigation(&service, vec![]).await;

        let started: Fumigation = service
            .update_status(&fumigation.id, FumigationStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(started.status, FumigationStatus::InProgress);

        let result = service
            .update_status::<Fumigation>(&fumigation.id, FumigationStatus::Completed)
            .await;
        assert!(matches!(
            result,
            Err(DomainError::InvalidStatusTransition { .. })
        ));
    }
}

mod activity_log {
    use async_trait::async_trait;
    use domain::ActivityLogger;

    use super::*;

    struct FailingLogger;

    #[async_trait]
    impl ActivityLogger for FailingLogger {
        async fn record(&self, _entry: ActivityEntry) -> Result<(), DomainError> {
            Err(DomainError::validation("activity sink unavailable"))
        }
    }

    #[tokio::test]
    async fn logger_failure_does_not_fail_the_operation() {
        let service = create_service().with_activity_logger(Arc::new(FailingLogger));
        let glyphosate = create_product(&service, "Glyphosate", 100.0).await;
        let fumigation =
            schedule_fumigation(&service, vec![fumigation_line(&glyphosate, 30.0)]).await;

        let completed = service
            .complete_fumigation(&fumigation.id, FumigationCompletion::default())
            .await
            .unwrap();

        assert_eq!(completed.fumigation.status, FumigationStatus::Completed);
        assert_eq!(stock_of(&service, &glyphosate).await, 70.0);
        assert!(service.recent_activity(50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn completion_is_logged_after_commit() {
        let service = create_service();
        let glyphosate = create_product(&service, "Glyphosate", 100.0).await;
        let fumigation =
            schedule_fumigation(&service, vec![fumigation_line(&glyphosate, 30.0)]).await;

        service
            .complete_fumigation(&fumigation.id, FumigationCompletion::default())
            .await
            .unwrap();

        let entries = service.recent_activity(50).await.unwrap();
        let completed: Vec<&ActivityEntry> = entries
            .iter()
            .filter(|e| e.action == ActivityAction::Completed)
            .collect();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].entity_id, fumigation.id);
        assert_eq!(completed[0].metadata["deductions"][0]["newStock"], 70.0);
    }

    #[tokio::test]
    async fn failed_operation_is_not_logged() {
        let service = create_service();
        let urea = create_product(&service, "Urea", 1.0).await;

        let _ = service
            .create_harvest(new_harvest(vec![harvest_line(&urea, 5.0)]))
            .await;

        let entries = service.recent_activity(50).await.unwrap();
        assert!(entries.iter().all(|e| e.entity_type != Harvest::KIND));
        assert_eq!(
            service
                .store()
                .query(document_store::DocumentQuery::collection("harvests"))
                .await
                .unwrap()
                .len(),
            0
        );
    }
}
