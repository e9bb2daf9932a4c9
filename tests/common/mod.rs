#![allow(dead_code)]

use serde_json::{Value, json};
use state_migrations::{
    ClientType, Direction, MemoryStorage, MigrationHelper, MigrationHelperType, Migrator,
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug)]
pub struct InjectedProperty {
    pub name: String,
    pub value: String,
    pub path: Vec<String>,
}

pub fn helper_for(
    storage: &Arc<MemoryStorage>,
    version: u32,
    client_type: ClientType,
) -> MigrationHelper {
    MigrationHelper::new(
        version,
        storage.clone(),
        MigrationHelperType::GENERAL,
        client_type,
    )
}

pub fn storage_from(initial: Value) -> Arc<MemoryStorage> {
    Arc::new(MemoryStorage::from_json(initial).expect("test state must be a JSON object"))
}

/// Adds a uniquely named string property to every object in `data`.
fn inject(data: &mut Value, path: &[String]) -> Vec<InjectedProperty> {
    let Value::Object(map) = data else {
        return Vec::new();
    };

    let mut injected = Vec::new();
    for (key, child) in map.iter_mut() {
        if child.is_object() {
            let mut child_path = path.to_vec();
            child_path.push(key.clone());
            injected.extend(inject(child, &child_path));
        }
    }

    let property = InjectedProperty {
        name: format!("__injectedProperty__{}", Uuid::new_v4()),
        value: format!("__injectedValue__{}", Uuid::new_v4()),
        path: path.to_vec(),
    };
    map.insert(property.name.clone(), json!(property.value));
    injected.push(property);
    injected
}

/// Strips injected properties wherever they ended up, crossing them off
/// `injected` as they are found.
fn strip_injected(data: &mut Value, injected: &mut Vec<InjectedProperty>) {
    let Value::Object(map) = data else {
        return;
    };

    let found: Vec<String> = map
        .iter()
        .filter_map(|(key, value)| {
            let value = value.as_str()?;
            let index = injected
                .iter()
                .position(|property| property.name == *key && property.value == value)?;
            injected.swap_remove(index);
            Some(key.clone())
        })
        .collect();
    for key in found {
        map.remove(&key);
    }

    for child in map.values_mut() {
        strip_injected(child, injected);
    }
}

/// Runs one migrator body against `initial` with extra properties injected
/// at every object level, asserts none of them were lost, and returns the
/// resulting store without them.
pub async fn run_migrator<M: Migrator>(migrator: &M, initial: Value, direction: Direction) -> Value {
    let mut data = initial;
    let mut injected = inject(&mut data, &[]);

    let storage = storage_from(data);
    let helper = helper_for(&storage, migrator.from_version(), ClientType::Web);
    match direction {
        Direction::Up => migrator.migrate(&helper).await.expect("migrate failed"),
        Direction::Down => migrator.rollback(&helper).await.expect("rollback failed"),
    }

    let mut result = storage.to_json().await;
    strip_injected(&mut result, &mut injected);
    assert!(injected.is_empty(), "injected properties were dropped: {:?}", injected);
    result
}
