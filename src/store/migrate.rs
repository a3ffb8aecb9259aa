use crate::store::keys;
use crate::store::{Store, StoreError};

type MigrationFn = fn(&Store) -> Result<(), StoreError>;

fn migrations() -> Vec<(&'static str, MigrationFn)> {
    vec![
        ("001_initial", m001_initial),
        ("002_drop_legacy_motivation", m002_drop_legacy_motivation),
    ]
}

/// 执行所有未应用的存储迁移。
///
/// - **幂等性要求**：迁移可能在执行成功但版本号写入之前中断，重启后会重新执行。
/// - **仅向前**：set_version 拒绝降级。
///
/// Document shape upgrades (e.g. the legacy `learning-progress` map) are not
/// done here; each tracker migrates its own document on load.
pub fn run(store: &Store) -> Result<(), StoreError> {
    let current = get_current_version(store)?;

    for (index, (name, func)) in migrations().iter().enumerate() {
        let version = (index + 1) as u32;
        if version > current {
            tracing::info!(version, name, "Running migration");
            func(store)?;
            set_version(store, version)?;
            tracing::info!(version, name, "Migration complete");
        } else {
            tracing::debug!(version, name, "Migration already applied, skipping");
        }
    }

    Ok(())
}

pub fn get_current_version(store: &Store) -> Result<u32, StoreError> {
    match store.get_meta(keys::SCHEMA_VERSION)? {
        Some(raw) => {
            let bytes: [u8; 4] = raw.as_slice().try_into().unwrap_or([0; 4]);
            Ok(u32::from_be_bytes(bytes))
        }
        None => Ok(0),
    }
}

pub fn set_version(store: &Store, version: u32) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    if version < current {
        return Err(StoreError::Migration {
            version,
            message: format!("Refuse to downgrade from {} to {}", current, version),
        });
    }

    store.set_meta(keys::SCHEMA_VERSION, &version.to_be_bytes())
}

fn m001_initial(_store: &Store) -> Result<(), StoreError> {
    Ok(())
}

fn m002_drop_legacy_motivation(store: &Store) -> Result<(), StoreError> {
    if store.remove(keys::LEGACY_MOTIVATION)? {
        tracing::info!(key = keys::LEGACY_MOTIVATION, "Removed legacy document");
    }
    Ok(())
}
