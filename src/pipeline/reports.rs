//! Typed report calls layered over [`EventDispatcher::add_event`].

use super::EventDispatcher;
use crate::domain::{EventKind, Item, Payload, unix_time_now};
use tracing::warn;

impl EventDispatcher {
    pub fn report_button_click(&self, button: &str) {
        self.add_event(EventKind::ButtonClick, Payload::from(button));
    }

    pub fn report_window_open(&self, window: &str) {
        self.add_event(EventKind::WindowOpen, Payload::from(window));
    }

    pub fn report_window_close(&self, window: &str) {
        self.add_event(EventKind::WindowClose, Payload::from(window));
    }

    pub fn report_scene_loaded(&self, scene: &str) {
        self.add_event(EventKind::SceneLoaded, Payload::from(scene));
    }

    pub fn report_scene_unloaded(&self, scene: &str) {
        self.add_event(EventKind::SceneUnloaded, Payload::from(scene));
    }

    /// Timestamp, product and price are appended under one lock so they are
    /// never split across batches.
    pub fn report_in_app_purchase(&self, product: &str, price_usd_cents: u32) {
        let records = [
            (EventKind::PurchaseTimestamp, Payload::Timestamp(unix_time_now())),
            (EventKind::PurchaseProductId, Payload::from(product)),
            (EventKind::PurchaseProductPriceUsdCents, Payload::U32(price_usd_cents)),
        ];
        self.record(|active, config| {
            let mut signal = false;
            for (kind, payload) in &records {
                signal |= active.batch.append(kind.code(), payload, config);
            }
            signal
        });
    }

    pub fn report_install_campaign(&self, campaign: &str) {
        self.add_event(EventKind::InstallCampaign, Payload::from(campaign));
    }

    pub fn report_user_country(&self, country: &str) {
        self.add_event(EventKind::Country, Payload::from(country));
    }

    pub fn report_game_language(&self, language: &str) {
        self.add_event(EventKind::GameLang, Payload::from(language));
    }

    pub fn report_app_pause(&self) {
        self.add_event(EventKind::AppPause, Payload::Timestamp(unix_time_now()));
    }

    pub fn report_app_resume(&self) {
        self.add_event(EventKind::AppResume, Payload::Timestamp(unix_time_now()));
    }

    pub fn report_internet_connected(&self) {
        self.add_event(EventKind::InternetConnected, Payload::Empty);
    }

    pub fn report_internet_disconnected(&self) {
        self.add_event(EventKind::InternetDisconnected, Payload::Empty);
    }

    pub fn report_low_memory(&self) {
        self.add_event(EventKind::LowMemWarning, Payload::Empty);
    }

    pub fn log_error(&self, message: &str) {
        self.add_event(EventKind::ErrorMsg, Payload::from(message));
    }

    pub fn report_ab_test_assignment(&self, test: &str, group: char) {
        self.add_event(
            EventKind::AbTestAssignment,
            Payload::AbTestAssignment {
                test: test.to_string(),
                group,
            },
        );
    }

    pub fn report_items_exchange(&self, location: &str, from: &[Item], to: &[Item]) {
        self.add_event(
            EventKind::ItemsExchange,
            Payload::ItemsExchange {
                location: location.to_string(),
                from: from.to_vec(),
                to: to.to_vec(),
            },
        );
    }

    pub fn report_items_reset(&self, location: &str, items: &[Item]) {
        self.add_event(
            EventKind::ItemsReset,
            Payload::ItemsReset {
                location: location.to_string(),
                items: items.to_vec(),
            },
        );
    }

    pub fn report_onboarding_milestone(&self, milestone: &str) {
        let label = self.milestones.lock().next_label(milestone);
        self.add_event(EventKind::OnboardingMilestone, Payload::from(label));
    }

    /// Looks `name` up in the custom event table. Unknown names and payloads
    /// that do not match the declared type are dropped.
    pub fn report_custom(&self, name: &str, payload: Payload) {
        let Some(code) = self.custom_events.id_of(name) else {
            warn!(name, "Dropping unknown custom event");
            return;
        };
        self.add_event(code, payload);
    }
}
