use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::builder::TriangularListBuilder;
use crate::mock_adapter::MockAdapter;

#[derive(Clone, Copy, Debug)]
struct Item {
    at: DateTime<Utc>,
    spent: Decimal,
    earn: f64,
    spend: f64,
}

fn item(at: DateTime<Utc>, spent: Decimal) -> Item {
    Item { at, spent, earn: 0.0, spend: 0.0 }
}

fn per_minute(at: &DateTime<Utc>) -> i64 {
    Utc.with_ymd_and_hms(at.year(), at.month(), at.day(), at.hour(), at.minute(), 0)
        .unwrap()
        .timestamp()
}

fn per_hour(at: &DateTime<Utc>) -> i64 {
    Utc.with_ymd_and_hms(at.year(), at.month(), at.day(), at.hour(), 0, 0)
        .unwrap()
        .timestamp()
}

fn per_day(at: &DateTime<Utc>) -> i64 {
    Utc.with_ymd_and_hms(at.year(), at.month(), at.day(), 0, 0, 0).unwrap().timestamp()
}

fn per_week(at: &DateTime<Utc>) -> i64 {
    let start_of_day = Utc.with_ymd_and_hms(at.year(), at.month(), at.day(), 0, 0, 0).unwrap();
    let back_to_monday = Duration::days(i64::from(at.weekday().num_days_from_monday()));
    (start_of_day - back_to_monday).timestamp()
}

fn min_max_dt(a: DateTime<Utc>, b: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[tokio::test]
async fn hourly_sum_answers_any_key_in_the_bucket() {
    let adapter = MockAdapter::default();
    let engine = TriangularListBuilder::<Item, DateTime<Utc>, _>::new()
        .using_storage("orders", adapter)
        .key_on(|item: &Item| item.at, min_max_dt)
        .aggregate("Spent", |item: &Item| item.spent, |a: Decimal, b: Decimal| a + b)
        .rank(1, "PerHour", per_hour)
        .build()
        .await
        .expect("engine builds");

    let at = Utc.with_ymd_and_hms(2020, 5, 5, 10, 11, 12, 0).unwrap();
    engine.write_item(&item(at, dec!(5.1))).await.unwrap();

    let probe = Utc.with_ymd_and_hms(2020, 5, 5, 10, 10, 32, 0).unwrap();
    let value: Decimal = engine
        .read_aggregate_at("Spent", "PerHour", &probe)
        .await
        .unwrap()
        .expect("bucket exists");
    assert_eq!(value, dec!(5.1));
}

#[tokio::test]
async fn multi_rank_reconciliation_across_six_hours() {
    let adapter = MockAdapter::default();
    let engine = TriangularListBuilder::<Item, DateTime<Utc>, _>::new()
        .using_storage("orders", adapter)
        .key_on(|item: &Item| item.at, min_max_dt)
        .aggregate("Spent", |item: &Item| item.spent, |a: Decimal, b: Decimal| a + b)
        .rank(1, "PerMinute", per_minute)
        .rank(2, "PerHour", per_hour)
        .rank(3, "PerDay", per_day)
        .rank(4, "PerWeek", per_week)
        .build()
        .await
        .expect("engine builds");

    let base = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0, 0).unwrap();
    for hour in 0..6_i64 {
        let at = base + Duration::hours(hour);
        engine.write_item(&item(at, dec!(3.00))).await.unwrap();
        engine
            .write_item(&item(at + Duration::minutes(20), dec!(7.04)))
            .await
            .unwrap();
    }

    let range_start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0, 0).unwrap();
    let range_end = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0, 0).unwrap();
    let mut values = Vec::new();
    let mut stream = engine
        .read_aggregate_range::<Decimal>("Spent", "PerHour", &range_start, &range_end)
        .await
        .unwrap();
    use futures::StreamExt;
    while let Some(row) = stream.next().await {
        let (_, value) = row.unwrap();
        values.push(value);
    }

    assert_eq!(values.len(), 6);
    assert_eq!(values[0], dec!(10.04));
    assert!(values.iter().all(|v| *v == dec!(10.04)));
}

#[tokio::test]
async fn count_and_bounds_over_thirty_minute_increments() {
    let adapter = MockAdapter::default();
    let engine = TriangularListBuilder::<Item, DateTime<Utc>, _>::new()
        .using_storage("orders", adapter)
        .key_on(|item: &Item| item.at, min_max_dt)
        .aggregate("Spent", |item: &Item| item.spent, |a: Decimal, b: Decimal| a + b)
        .rank(1, "PerHour", per_hour)
        .rank(2, "PerDay", per_day)
        .build()
        .await
        .expect("engine builds");

    let base = Utc.with_ymd_and_hms(2020, 5, 5, 0, 0, 0, 0).unwrap();
    for slot in 0..48_i64 {
        let at = base + Duration::minutes(slot * 30);
        engine.write_item(&item(at, dec!(1.01))).await.unwrap();
    }

    let probe = Utc.with_ymd_and_hms(2020, 5, 5, 5, 0, 0, 0).unwrap();
    let bucket = engine
        .read_point_at::<Decimal>("Spent", "PerHour", &probe)
        .await
        .unwrap()
        .expect("bucket exists");

    assert_eq!(bucket.value, dec!(2.02));
    assert_eq!(bucket.count, 2);
    assert_eq!(bucket.lower_bound, Utc.with_ymd_and_hms(2020, 5, 5, 5, 0, 0, 0).unwrap());
    assert_eq!(bucket.upper_bound, Utc.with_ymd_and_hms(2020, 5, 5, 5, 30, 0, 0).unwrap());
}

#[tokio::test]
async fn max_aggregation_is_not_assumed_commutative_but_is_correct() {
    let adapter = MockAdapter::default();
    let engine = TriangularListBuilder::<Item, DateTime<Utc>, _>::new()
        .using_storage("orders", adapter)
        .key_on(|item: &Item| item.at, min_max_dt)
        .aggregate(
            "MaxTransaction",
            |item: &Item| item.spend.max(item.earn),
            f64::max,
        )
        .rank(1, "PerHour", per_hour)
        .rank(2, "PerDay", per_day)
        .build()
        .await
        .expect("engine builds");

    let base = Utc.with_ymd_and_hms(2020, 5, 5, 0, 0, 0, 0).unwrap();
    let mut items = Vec::with_capacity(48);
    for slot in 0..48_i64 {
        let at = base + Duration::minutes(slot * 30);
        let spend = ((slot * 17) % 23) as f64;
        let earn = ((slot * 11) % 19) as f64;
        items.push(Item { at, spent: dec!(0), spend, earn });
    }
    for entry in &items {
        engine.write_item(entry).await.unwrap();
    }

    let expected = items
        .iter()
        .map(|entry| entry.spend.max(entry.earn))
        .fold(f64::MIN, f64::max);

    let probe = Utc.with_ymd_and_hms(2020, 5, 5, 5, 0, 0, 0).unwrap();
    let bucket = engine
        .read_point_at::<f64>("MaxTransaction", "PerDay", &probe)
        .await
        .unwrap()
        .expect("bucket exists");

    assert_eq!(bucket.value, expected);
}

#[tokio::test]
async fn children_under_point_preserve_insertion_order() {
    let adapter = MockAdapter::default();
    let engine = TriangularListBuilder::<Item, DateTime<Utc>, _>::new()
        .using_storage("orders", adapter)
        .key_on(|item: &Item| item.at, min_max_dt)
        .aggregate("Spent", |item: &Item| item.spent, |a: Decimal, b: Decimal| a + b)
        .rank(1, "PerHour", per_hour)
        .build()
        .await
        .expect("engine builds");

    let hour = |h: u32, m: u32| Utc.with_ymd_and_hms(2020, 5, 5, h, m, 0, 0).unwrap();
    let ordered = [
        item(hour(9, 5), dec!(1.00)),
        item(hour(10, 0), dec!(2.00)),
        item(hour(10, 15), dec!(3.00)),
        item(hour(10, 45), dec!(4.00)),
        item(hour(11, 0), dec!(5.00)),
        item(hour(12, 0), dec!(6.00)),
    ];
    for entry in &ordered {
        engine.write_item(entry).await.unwrap();
    }

    let children = engine
        .read_children_of_point::<Decimal>("Spent", "PerHour", &hour(10, 0))
        .await
        .unwrap();

    assert_eq!(children.len(), 3);
    assert!(children.iter().all(|bucket| bucket.count == 1));
    assert_eq!(
        children.iter().map(|bucket| bucket.value).collect::<Vec<_>>(),
        vec![dec!(2.00), dec!(3.00), dec!(4.00)]
    );
}

#[tokio::test]
async fn rebuilding_against_the_same_group_observes_prior_data() {
    let adapter = Arc::new(MockAdapter::default());
    let base = Utc.with_ymd_and_hms(2020, 5, 5, 9, 0, 0, 0).unwrap();

    {
        let engine = TriangularListBuilder::<Item, DateTime<Utc>, _>::new()
            .using_storage("orders", Arc::clone(&adapter))
            .key_on(|item: &Item| item.at, min_max_dt)
            .aggregate("Spent", |item: &Item| item.spent, |a: Decimal, b: Decimal| a + b)
            .rank(1, "PerHour", per_hour)
            .build()
            .await
            .expect("engine builds");

        for slot in 0..10_i64 {
            engine
                .write_item(&item(base + Duration::minutes(slot * 5), dec!(1.00)))
                .await
                .unwrap();
        }
    }

    let engine = TriangularListBuilder::<Item, DateTime<Utc>, _>::new()
        .using_storage("orders", Arc::clone(&adapter))
        .key_on(|item: &Item| item.at, min_max_dt)
        .aggregate("Spent", |item: &Item| item.spent, |a: Decimal, b: Decimal| a + b)
        .rank(1, "PerHour", per_hour)
        .build()
        .await
        .expect("engine rebuilds against the same group");

    for slot in 10..12_i64 {
        engine
            .write_item(&item(base + Duration::minutes(slot * 5), dec!(1.00)))
            .await
            .unwrap();
    }

    let value: Decimal = engine
        .read_aggregate_at("Spent", "PerHour", &base)
        .await
        .unwrap()
        .expect("bucket exists");
    assert_eq!(value, dec!(12.00));
}

#[tokio::test]
async fn dropping_and_rebuilding_yields_an_empty_store() {
    let adapter = Arc::new(MockAdapter::default());
    let engine = TriangularListBuilder::<Item, DateTime<Utc>, _>::new()
        .using_storage("orders", Arc::clone(&adapter))
        .key_on(|item: &Item| item.at, min_max_dt)
        .aggregate("Spent", |item: &Item| item.spent, |a: Decimal, b: Decimal| a + b)
        .rank(1, "PerHour", per_hour)
        .build()
        .await
        .expect("engine builds");

    let at = Utc.with_ymd_and_hms(2020, 5, 5, 10, 0, 0, 0).unwrap();
    engine.write_item(&item(at, dec!(5.00))).await.unwrap();
    engine.delete_all_tables_and_data().await.unwrap();

    assert!(matches!(
        engine.write_item(&item(at, dec!(1.00))).await,
        Err(crate::error::Error::EngineDeleted)
    ));

    let rebuilt = TriangularListBuilder::<Item, DateTime<Utc>, _>::new()
        .using_storage("orders", Arc::clone(&adapter))
        .key_on(|item: &Item| item.at, min_max_dt)
        .aggregate("Spent", |item: &Item| item.spent, |a: Decimal, b: Decimal| a + b)
        .rank(1, "PerHour", per_hour)
        .build()
        .await
        .expect("engine rebuilds after delete");

    let value = rebuilt.read_aggregate_at::<Decimal>("Spent", "PerHour", &at).await.unwrap();
    assert!(value.is_none());
}

#[tokio::test]
async fn builder_rejects_gaps_in_rank_numbers() {
    let adapter = MockAdapter::default();
    let result = TriangularListBuilder::<Item, DateTime<Utc>, _>::new()
        .using_storage("orders", adapter)
        .key_on(|item: &Item| item.at, min_max_dt)
        .aggregate("Spent", |item: &Item| item.spent, |a: Decimal, b: Decimal| a + b)
        .rank(1, "PerHour", per_hour)
        .rank(3, "PerDay", per_day)
        .build()
        .await;

    assert!(matches!(result, Err(crate::error::Error::ConfigInvalid(_))));
}

#[tokio::test]
async fn builder_requires_at_least_one_aggregate() {
    let adapter = MockAdapter::default();
    let result = TriangularListBuilder::<Item, DateTime<Utc>, _>::new()
        .using_storage("orders", adapter)
        .key_on(|item: &Item| item.at, min_max_dt)
        .rank(1, "PerHour", per_hour)
        .build()
        .await;

    assert!(matches!(result, Err(crate::error::Error::ConfigInvalid(_))));
}

#[tokio::test]
async fn unknown_aggregate_name_fails_reads() {
    let adapter = MockAdapter::default();
    let engine = TriangularListBuilder::<Item, DateTime<Utc>, _>::new()
        .using_storage("orders", adapter)
        .key_on(|item: &Item| item.at, min_max_dt)
        .aggregate("Spent", |item: &Item| item.spent, |a: Decimal, b: Decimal| a + b)
        .rank(1, "PerHour", per_hour)
        .build()
        .await
        .expect("engine builds");

    let at = Utc.with_ymd_and_hms(2020, 5, 5, 10, 0, 0, 0).unwrap();
    let result = engine.read_aggregate_at::<Decimal>("NotRegistered", "PerHour", &at).await;
    assert!(matches!(result, Err(crate::error::Error::UnknownAggregate(_))));
}

#[tokio::test]
async fn unknown_rank_name_fails_reads() {
    let adapter = MockAdapter::default();
    let engine = TriangularListBuilder::<Item, DateTime<Utc>, _>::new()
        .using_storage("orders", adapter)
        .key_on(|item: &Item| item.at, min_max_dt)
        .aggregate("Spent", |item: &Item| item.spent, |a: Decimal, b: Decimal| a + b)
        .rank(1, "PerHour", per_hour)
        .build()
        .await
        .expect("engine builds");

    let at = Utc.with_ymd_and_hms(2020, 5, 5, 10, 0, 0, 0).unwrap();
    let result = engine.read_aggregate_at::<Decimal>("Spent", "PerWeek", &at).await;
    assert!(matches!(result, Err(crate::error::Error::UnknownRank(_))));
}
