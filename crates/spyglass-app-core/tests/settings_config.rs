// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Settings persistence through `ConfigService` backed by the in-memory store fake.
#![allow(missing_docs)]

use spyglass_app_core::config::{ConfigError, ConfigService, ConfigStore, SETTINGS_KEY};
use spyglass_app_core::settings::SpyglassSettings;
use std::cell::Cell;
use std::rc::Rc;

use spyglass_core::{BreakpointHit, EventKind, Producer, TagResolver};
use spyglass_dry_tests::{FakeProducer, Harness, InMemoryConfigStore};

#[test]
fn missing_settings_fall_back_to_defaults() {
    let service = ConfigService::new(InMemoryConfigStore::new());
    let settings = service.load_settings().unwrap();
    assert_eq!(settings, SpyglassSettings::default());
}

#[test]
fn settings_round_trip_through_store() {
    let store = InMemoryConfigStore::new();
    let service = ConfigService::new(store.clone());
    let mut settings = SpyglassSettings {
        kept_values: 16,
        ..SpyglassSettings::default()
    };
    settings.breakpoint.tag = Some("clicks".into());
    settings.breakpoint.events = vec![EventKind::Next, EventKind::Error];

    service.save_settings(&settings).unwrap();
    assert!(store.contains_key(SETTINGS_KEY));
    assert_eq!(service.load_settings().unwrap(), settings);
}

#[test]
fn partial_settings_fill_defaults() {
    let store = InMemoryConfigStore::new();
    store
        .save_raw(SETTINGS_KEY, br#"{ "kept_values": 2 }"#)
        .unwrap();
    let settings = ConfigService::new(store).load_settings().unwrap();
    assert_eq!(settings.kept_values, 2);
    assert_eq!(
        settings.diagnostics_capacity,
        SpyglassSettings::default().diagnostics_capacity
    );
}

#[test]
fn malformed_settings_surface_serde_error() {
    let store = InMemoryConfigStore::new();
    store.save_raw(SETTINGS_KEY, b"{ nope").unwrap();
    let err = ConfigService::new(store).load_settings().unwrap_err();
    assert!(matches!(err, ConfigError::Serde(_)));
}

#[test]
fn invalid_settings_are_not_saved() {
    let store = InMemoryConfigStore::new();
    let service = ConfigService::new(store.clone());
    let mut settings = SpyglassSettings::default();
    settings.breakpoint.tag = Some("clicks".into());
    settings.breakpoint.events.clear();

    let err = service.save_settings(&settings).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert_eq!(store.save_count(), 0);
}

#[test]
fn store_failures_propagate() {
    let store = InMemoryConfigStore::new();
    store.set_fail_on_load(true);
    let err = ConfigService::new(store).load_settings().unwrap_err();
    assert!(matches!(err, ConfigError::Other(_)));
}

struct ExternalTags;

impl TagResolver for ExternalTags {
    fn resolve(&self, producer: &dyn Producer) -> Option<String> {
        (producer.id().value() == 7).then(|| "clicks".to_owned())
    }
}

#[test]
fn configured_breakpoint_uses_the_engine_tag_resolver() {
    let mut settings = SpyglassSettings::default();
    settings.breakpoint.tag = Some("clicks".into());
    settings.breakpoint.events = vec![EventKind::Next];

    let mut h = Harness::with_engine(settings.engine_config(), |e| e.with_tags(ExternalTags));
    let fired = Rc::new(Cell::new(0_u32));
    let counter = Rc::clone(&fired);
    let breakpoint = settings
        .breakpoint(Some(h.engine.clone()), move |_: &BreakpointHit| {
            counter.set(counter.get() + 1);
        })
        .unwrap();
    h.runtime.add_hook(breakpoint);

    let producer = FakeProducer::new(7);
    let s = h.runtime.subscriber();
    h.runtime.subscribe(&producer, s);
    h.runtime.next(&producer, s, 1_i32);
    h.runtime.next(&producer, s, 2_i32);

    assert_eq!(fired.get(), 2);
}
