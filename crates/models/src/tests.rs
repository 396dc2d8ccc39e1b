use chrono::Utc;
use migration::MigratorTrait;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;

use crate::{car, db, manufacture};

fn db_tests_enabled() -> bool {
    std::env::var("SKIP_DB_TESTS").is_err() && std::env::var("DATABASE_URL").is_ok()
}

#[test]
fn images_json_round_trip_keeps_order() {
    let images = vec!["b.png".to_string(), "a.jpg".to_string()];
    let json = car::images_to_json(&images);
    assert_eq!(car::images_from_json(&json).unwrap(), images);
}

#[test]
fn images_json_rejects_non_strings() {
    let bad = serde_json::json!(["ok.png", 3]);
    assert!(car::images_from_json(&bad).is_err());
    assert!(car::images_from_json(&serde_json::json!({"a": 1})).is_err());
}

#[tokio::test]
async fn car_with_manufacture_persists() -> anyhow::Result<()> {
    if !db_tests_enabled() { return Ok(()); }
    let db = db::connect().await?;
    migration::Migrator::up(&db, None).await?;

    let now = Utc::now();
    let m = manufacture::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(format!("model_test_{}", Uuid::new_v4())),
        description: Set(None),
        founder: Set(None),
        director: Set(None),
        website: Set(None),
        image: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&db)
    .await?;

    let c = car::ActiveModel {
        id: Set(Uuid::new_v4()),
        brand: Set("Skoda".into()),
        model: Set("Octavia".into()),
        year: Set(2020),
        price: Set(18500.0),
        color: Set("white".into()),
        gearbox: Set("manual".into()),
        manufacture_id: Set(Some(m.id)),
        images: Set(car::images_to_json(&["x.png".to_string()])),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&db)
    .await?;

    let found = car::Entity::find_by_id(c.id).one(&db).await?.expect("car row");
    assert_eq!(found.manufacture_id, Some(m.id));
    assert_eq!(car::images_from_json(&found.images)?, vec!["x.png".to_string()]);

    car::Entity::delete_by_id(c.id).exec(&db).await?;
    manufacture::Entity::delete_by_id(m.id).exec(&db).await?;
    Ok(())
}
