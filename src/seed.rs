//! Reference data for local development and demos: the two public village
//! routes with their POIs, plus a demo wallet.

use tracing::info;

use crate::models::route::PoiRow;
use crate::store::postgres::PgStore;

pub async fn run(store: &PgStore) -> anyhow::Result<()> {
    store
        .insert_route("route_1", "箭塔村创业探索", Some("箭塔村创业路径"), 120)
        .await?;
    store
        .insert_route("route_2", "箭塔村文化历史", Some("箭塔村文化历史"), 120)
        .await?;

    let pois = [
        PoiRow {
            id: "poi_9".into(),
            route_id: "route_1".into(),
            name: "箭塔村——猫鼻子餐厅".into(),
            ordinal: 9,
            latitude: 39.9042,
            longitude: 116.4074,
            task_prompt: Some("猫鼻子餐厅是箭塔村的特色餐厅".into()),
        },
        PoiRow {
            id: "poi_11".into(),
            route_id: "route_1".into(),
            name: "箭塔村——吾乡乡村创业孵化器".into(),
            ordinal: 11,
            latitude: 39.9042,
            longitude: 116.4074,
            task_prompt: Some("吾乡乡村创业孵化器是箭塔村的创业空间".into()),
        },
        PoiRow {
            id: "poi_22".into(),
            route_id: "route_1".into(),
            name: "箭塔村——青年创客园地".into(),
            ordinal: 22,
            latitude: 39.9042,
            longitude: 116.4074,
            task_prompt: Some("青年创客园地是箭塔村的创客空间".into()),
        },
        PoiRow {
            id: "poi_2".into(),
            route_id: "route_2".into(),
            name: "箭塔村——山花茶社".into(),
            ordinal: 2,
            latitude: 41.3786,
            longitude: 116.0156,
            task_prompt: Some("山花茶社是箭塔村的特色茶馆".into()),
        },
        PoiRow {
            id: "poi_20".into(),
            route_id: "route_2".into(),
            name: "箭塔村——箭塔村村史馆".into(),
            ordinal: 20,
            latitude: 39.9042,
            longitude: 116.4074,
            task_prompt: Some("箭塔村村史馆记录了箭塔村的历史".into()),
        },
        PoiRow {
            id: "poi_21".into(),
            route_id: "route_2".into(),
            name: "箭塔村——周先生的百草园".into(),
            ordinal: 21,
            latitude: 39.9042,
            longitude: 116.4074,
            task_prompt: Some("周先生的百草园是箭塔村的特色景点".into()),
        },
    ];

    for poi in &pois {
        store.insert_poi(poi).await?;
    }

    store
        .upsert_user(
            "0x742d35Cc6634C0532925a3b8D6B3981d6F2F4a5a",
            Some("demo-explorer"),
        )
        .await?;

    info!(routes = 2, pois = pois.len(), "seed data inserted");
    Ok(())
}
