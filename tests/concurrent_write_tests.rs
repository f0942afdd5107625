//! Tests de integración del protocolo de escritura concurrente
//!
//! Usan almacenes en memoria que simulan escritores concurrentes bumpeando
//! la versión por debajo del protocolo, sin base de datos real.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use car_marketplace::dto::car_dto::CarFilters;
use car_marketplace::models::car::{Car, CarStatus};
use car_marketplace::models::history::{HistoryData, HistoryRecord};
use car_marketplace::repositories::{CarStore, HistoryStore};
use car_marketplace::services::concurrent_update::ConcurrentUpdateProtocol;
use car_marketplace::utils::errors::{AppError, AppResult};

/// Almacén en memoria con carreras de versión inyectables: mientras queden
/// carreras pendientes, cada escritura condicional pierde contra un escritor
/// fantasma que incrementa la versión persistida.
#[derive(Default)]
struct InMemoryCarStore {
    cars: Mutex<HashMap<Uuid, Car>>,
    races: AtomicU32,
}

impl InMemoryCarStore {
    fn with_car(car: Car) -> Self {
        let store = Self::default();
        store.cars.lock().unwrap().insert(car.id, car);
        store
    }

    fn inject_races(&self, count: u32) {
        self.races.store(count, Ordering::SeqCst);
    }

    fn stored(&self, id: Uuid) -> Car {
        self.cars.lock().unwrap().get(&id).cloned().unwrap()
    }
}

#[async_trait]
impl CarStore for InMemoryCarStore {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Car>> {
        Ok(self.cars.lock().unwrap().get(&id).cloned())
    }

    async fn insert(&self, car: &Car) -> AppResult<()> {
        self.cars.lock().unwrap().insert(car.id, car.clone());
        Ok(())
    }

    async fn conditional_update(&self, car: &Car, expected_version: i32) -> AppResult<bool> {
        let mut cars = self.cars.lock().unwrap();
        let stored = match cars.get_mut(&car.id) {
            Some(stored) => stored,
            None => return Ok(false),
        };

        if self.races.load(Ordering::SeqCst) > 0 {
            self.races.fetch_sub(1, Ordering::SeqCst);
            stored.version += 1;
            return Ok(false);
        }

        if stored.version != expected_version {
            return Ok(false);
        }

        *stored = car.clone();
        Ok(true)
    }

    async fn find_active_by_registration(&self, registration: &str) -> AppResult<Option<Car>> {
        Ok(self
            .cars
            .lock()
            .unwrap()
            .values()
            .find(|c| c.registration.as_deref() == Some(registration))
            .cloned())
    }

    async fn find_by_filter(&self, _filters: &CarFilters) -> AppResult<Vec<Car>> {
        Ok(self.cars.lock().unwrap().values().cloned().collect())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.cars.lock().unwrap().remove(&id);
        Ok(())
    }
}

#[derive(Default)]
struct InMemoryHistoryStore {
    records: Mutex<HashMap<Uuid, HistoryRecord>>,
    mirrored_calls: Mutex<Vec<Uuid>>,
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn insert(&self, record: &HistoryRecord) -> AppResult<()> {
        self.records.lock().unwrap().insert(record.id, record.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<HistoryRecord>> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn update_mirrored(&self, id: Uuid, car: &Car) -> AppResult<()> {
        self.mirrored_calls.lock().unwrap().push(id);
        if let Some(record) = self.records.lock().unwrap().get_mut(&id) {
            record.service_history = car.service_history.clone();
            record.mot_due = car.mot_due;
            record.seats = car.seats;
            record.fuel_type = car.fuel_type.map(|f| format!("{:?}", f).to_lowercase());
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.records.lock().unwrap().remove(&id);
        Ok(())
    }
}

fn protocol_with(
    store: Arc<InMemoryCarStore>,
    history: Arc<InMemoryHistoryStore>,
) -> ConcurrentUpdateProtocol {
    ConcurrentUpdateProtocol::new(store, history)
}

fn car_at_version(version: i32) -> Car {
    let mut car = Car::new(Some("AB12CDE".to_string()));
    car.version = version;
    car
}

fn fields(entries: &[(&str, Value)]) -> Map<String, Value> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn update_increments_version_by_exactly_one() {
    let car = car_at_version(5);
    let id = car.id;
    let store = Arc::new(InMemoryCarStore::with_car(car));
    let history = Arc::new(InMemoryHistoryStore::default());
    let protocol = protocol_with(store.clone(), history);

    let updated = protocol
        .apply_update(id, 5, fields(&[("color", json!("Blue"))]))
        .await
        .unwrap();

    assert_eq!(updated.version, 6);
    assert_eq!(updated.color.as_deref(), Some("Blue"));
    assert_eq!(store.stored(id).version, 6);
}

#[tokio::test(start_paused = true)]
async fn lost_race_recomputes_against_fresh_state() {
    let car = car_at_version(5);
    let id = car.id;
    let store = Arc::new(InMemoryCarStore::with_car(car));
    let history = Arc::new(InMemoryHistoryStore::default());
    let protocol = protocol_with(store.clone(), history);

    // Un escritor fantasma gana la primera carrera y deja la versión en 6
    store.inject_races(1);

    let updated = protocol
        .apply_update(id, 5, fields(&[("color", json!("Blue"))]))
        .await
        .unwrap();

    // El reintento presenta la versión recargada, no la original
    assert_eq!(updated.version, 7);
    assert_eq!(store.stored(id).color.as_deref(), Some("Blue"));
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_concurrent_modification() {
    let car = car_at_version(5);
    let id = car.id;
    let store = Arc::new(InMemoryCarStore::with_car(car));
    let history = Arc::new(InMemoryHistoryStore::default());
    let protocol = protocol_with(store.clone(), history);

    store.inject_races(3);

    let result = protocol
        .apply_update(id, 5, fields(&[("color", json!("Blue"))]))
        .await;

    assert!(matches!(result, Err(AppError::ConcurrentModification(_))));
    // El estado persistido no contiene la escritura perdida
    assert_eq!(store.stored(id).color, None);
}

#[tokio::test(start_paused = true)]
async fn stale_presented_version_recovers_on_retry() {
    let car = car_at_version(5);
    let id = car.id;
    let store = Arc::new(InMemoryCarStore::with_car(car));
    let history = Arc::new(InMemoryHistoryStore::default());
    let protocol = protocol_with(store.clone(), history);

    // El caller presenta una versión desfasada; el primer intento la honra
    // y pierde, el segundo va contra el estado real
    let updated = protocol
        .apply_update(id, 4, fields(&[("color", json!("Blue"))]))
        .await
        .unwrap();

    assert_eq!(updated.version, 6);
}

#[tokio::test]
async fn bookkeeping_fields_never_reach_the_document() {
    let car = car_at_version(5);
    let id = car.id;
    let created_at = car.created_at;
    let store = Arc::new(InMemoryCarStore::with_car(car));
    let history = Arc::new(InMemoryHistoryStore::default());
    let protocol = protocol_with(store.clone(), history);

    let payload = fields(&[
        ("id", json!("11111111-1111-1111-1111-111111111111")),
        ("version", json!(99)),
        ("created_at", json!("1999-01-01T00:00:00Z")),
        ("color", json!("Blue")),
    ]);

    let updated = protocol.apply_update(id, 5, payload).await.unwrap();

    assert_eq!(updated.id, id);
    assert_eq!(updated.version, 6);
    assert_eq!(updated.created_at, created_at);
    assert_eq!(updated.color.as_deref(), Some("Blue"));
}

#[tokio::test]
async fn sold_car_cannot_be_resurrected() {
    let mut car = car_at_version(1);
    car.status = CarStatus::Sold;
    let id = car.id;
    let store = Arc::new(InMemoryCarStore::with_car(car));
    let history = Arc::new(InMemoryHistoryStore::default());
    let protocol = protocol_with(store.clone(), history);

    let result = protocol
        .apply_update(id, 1, fields(&[("status", json!("active"))]))
        .await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert_eq!(store.stored(id).status, CarStatus::Sold);
}

#[tokio::test]
async fn active_car_cannot_regress_to_draft() {
    let mut car = car_at_version(1);
    car.status = CarStatus::Active;
    car.photos = vec!["a.jpg".to_string()];
    let id = car.id;
    let store = Arc::new(InMemoryCarStore::with_car(car));
    let history = Arc::new(InMemoryHistoryStore::default());
    let protocol = protocol_with(store.clone(), history);

    // Ni siquiera vaciando las fotos: el estado solo avanza
    let result = protocol
        .apply_update(
            id,
            1,
            fields(&[("status", json!("draft")), ("photos", json!([]))]),
        )
        .await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
    let stored = store.stored(id);
    assert_eq!(stored.status, CarStatus::Active);
    assert_eq!(stored.photos, vec!["a.jpg".to_string()]);
}

#[tokio::test]
async fn client_cannot_wipe_edit_protection() {
    let mut car = car_at_version(1);
    car.color = Some("Nebula Grey".to_string());
    car.user_edited_fields.push("color".to_string());
    let id = car.id;
    let store = Arc::new(InMemoryCarStore::with_car(car));
    let history = Arc::new(InMemoryHistoryStore::default());
    let protocol = protocol_with(store.clone(), history);

    let updated = protocol
        .apply_update(
            id,
            1,
            fields(&[("user_edited_fields", json!([])), ("make", json!("Ford"))]),
        )
        .await
        .unwrap();

    // El payload no puede tocar los metadatos de protección
    assert_eq!(updated.user_edited_fields, vec!["color".to_string()]);
    assert_eq!(updated.make.as_deref(), Some("Ford"));
}

#[tokio::test]
async fn user_edit_survives_later_reconcile() {
    let car = car_at_version(1);
    let id = car.id;
    let store = Arc::new(InMemoryCarStore::with_car(car));
    let history = Arc::new(InMemoryHistoryStore::default());
    let protocol = protocol_with(store.clone(), history);

    // El vendedor corrige el color (campo protegido)
    let updated = protocol
        .apply_update(id, 1, fields(&[("color", json!("Nebula Grey"))]))
        .await
        .unwrap();
    assert!(updated.user_edited_fields.contains(&"color".to_string()));

    // Un refresco posterior trae otro color y un make nuevo
    let candidate = json!({ "color": "Grey", "make": "Audi" });
    let reconciled = protocol
        .apply_reconciled(id, updated.version, &candidate)
        .await
        .unwrap();

    assert_eq!(reconciled.color.as_deref(), Some("Nebula Grey"));
    assert_eq!(reconciled.make.as_deref(), Some("Audi"));
    assert_eq!(reconciled.version, 3);
}

#[tokio::test]
async fn reconcile_never_clobbers_present_with_empty() {
    let mut car = car_at_version(1);
    car.color = Some("Red".to_string());
    car.seats = Some(5);
    let id = car.id;
    let store = Arc::new(InMemoryCarStore::with_car(car));
    let history = Arc::new(InMemoryHistoryStore::default());
    let protocol = protocol_with(store.clone(), history);

    let candidate = json!({ "color": null, "seats": 4, "model": "" });
    let reconciled = protocol.apply_reconciled(id, 1, &candidate).await.unwrap();

    assert_eq!(reconciled.color.as_deref(), Some("Red"));
    assert_eq!(reconciled.seats, Some(4));
    assert_eq!(reconciled.model, None);
}

#[tokio::test]
async fn mirrored_fields_propagate_to_linked_record() {
    let mut car = car_at_version(1);
    let record = HistoryRecord::from_check(
        "AB12CDE",
        HistoryData::default(),
        Some("vehicledata".to_string()),
        false,
    );
    car.history_record_id = Some(record.id);
    let record_id = record.id;
    let id = car.id;

    let store = Arc::new(InMemoryCarStore::with_car(car));
    let history = Arc::new(InMemoryHistoryStore::default());
    history.insert(&record).await.unwrap();
    let protocol = protocol_with(store.clone(), history.clone());

    protocol
        .apply_update(
            id,
            1,
            fields(&[("seats", json!(7)), ("service_history", json!("full"))]),
        )
        .await
        .unwrap();

    assert_eq!(*history.mirrored_calls.lock().unwrap(), vec![record_id]);
    let patched = history.get_by_id(record_id).await.unwrap().unwrap();
    assert_eq!(patched.seats, Some(7));
    assert_eq!(patched.service_history.as_deref(), Some("full"));
}

#[tokio::test]
async fn non_mirrored_update_skips_secondary_write() {
    let mut car = car_at_version(1);
    let record = HistoryRecord::from_check(
        "AB12CDE",
        HistoryData::default(),
        Some("vehicledata".to_string()),
        false,
    );
    car.history_record_id = Some(record.id);
    let id = car.id;

    let store = Arc::new(InMemoryCarStore::with_car(car));
    let history = Arc::new(InMemoryHistoryStore::default());
    history.insert(&record).await.unwrap();
    let protocol = protocol_with(store.clone(), history.clone());

    protocol
        .apply_update(id, 1, fields(&[("color", json!("Blue"))]))
        .await
        .unwrap();

    assert!(history.mirrored_calls.lock().unwrap().is_empty());
}
