//! Countdown engine driven once per tick by the display layer
//!
//! Picks the countdown source for a card (explicit timer entity, discovered
//! vendor timer, or calendar target), and owns the resulting breakdown and
//! expired flag between ticks.

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc};
use tracing::{debug, info};

use crate::state::{CardConfig, CompactFormat, CountdownState, HostSnapshot, TimerData};
use super::{
    dates::parse_to_timestamp,
    localize::{translate, Localize},
    timer_entity::TimerEntityService,
};

const SECOND_MS: u64 = 1000;
const MINUTE_MS: u64 = 60 * SECOND_MS;
const HOUR_MS: u64 = 60 * MINUTE_MS;
const DAY_MS: u64 = 24 * HOUR_MS;

/// Which display units a breakdown may use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitMask {
    pub months: bool,
    pub days: bool,
    pub hours: bool,
    pub minutes: bool,
    pub seconds: bool,
}

impl UnitMask {
    pub fn from_config(config: &CardConfig) -> Self {
        Self {
            months: config.show_months,
            days: config.show_days,
            hours: config.show_hours,
            minutes: config.show_minutes,
            seconds: config.show_seconds,
        }
    }
}

/// Countdown state machine for one card instance
#[derive(Debug)]
pub struct CountdownEngine {
    timers: TimerEntityService,
    time_remaining: CountdownState,
    expired: bool,
    /// Target the expired flag was latched for
    expired_target: Option<DateTime<Utc>>,
    /// Last timer picked by auto-discovery, kept so a finished timer can
    /// still be shown after it vanishes from discovery
    last_known_timer: Option<TimerData>,
    /// Timer backing the most recent update, if any
    current_timer: Option<TimerData>,
}

impl CountdownEngine {
    pub fn new(timers: TimerEntityService) -> Self {
        Self {
            timers,
            time_remaining: CountdownState::zero(),
            expired: false,
            expired_target: None,
            last_known_timer: None,
            current_timer: None,
        }
    }

    pub fn timers(&self) -> &TimerEntityService {
        &self.timers
    }

    /// Recompute the countdown from one host snapshot
    pub fn update_countdown(
        &mut self,
        config: &CardConfig,
        host: &HostSnapshot,
        now: DateTime<Utc>,
    ) -> CountdownState {
        if let Some(data) = self.explicit_timer(config, host, now) {
            self.apply_timer(config, data);
            return self.time_remaining;
        }

        if config.auto_discovery_enabled() {
            match self.discover_timer(config, host, now) {
                Some(data) => {
                    self.last_known_timer = Some(data.clone());
                    self.apply_timer(config, data);
                }
                None => match self.last_known_timer.clone().filter(TimerData::is_finished) {
                    Some(finished) => {
                        debug!("No discovered timers, keeping finished {}", finished.entity_id());
                        self.time_remaining = CountdownState::zero();
                        self.expired = true;
                        self.current_timer = Some(finished);
                    }
                    None => {
                        self.last_known_timer = None;
                        self.reset();
                    }
                },
            }
            return self.time_remaining;
        }

        self.current_timer = None;
        self.update_calendar(config, now);
        self.time_remaining
    }

    /// Progress percentage for the card's current source
    pub fn calculate_progress(&self, config: &CardConfig, host: &HostSnapshot, now: DateTime<Utc>) -> f64 {
        if let Some(data) = self.explicit_timer(config, host, now) {
            return data.progress();
        }

        if config.auto_discovery_enabled() {
            return match self.discover_timer(config, host, now) {
                Some(data) => data.progress(),
                None if self.last_known_timer.as_ref().is_some_and(TimerData::is_finished) => 100.0,
                None => 0.0,
            };
        }

        let Some(target) = config.target_date() else {
            return 0.0;
        };
        if self.expired {
            return 100.0;
        }
        let target = parse_to_timestamp(target, now);
        if target <= now {
            return 100.0;
        }
        let creation = config
            .creation_date()
            .map(|raw| parse_to_timestamp(raw, now))
            .unwrap_or(now);
        calendar_progress(creation, target, now)
    }

    /// Subtitle text for the card's current source.
    ///
    /// `compact` forces the abbreviated multi-unit format; otherwise the
    /// card's `compact_format` setting decides.
    pub fn get_subtitle(
        &self,
        config: &CardConfig,
        host: &HostSnapshot,
        now: DateTime<Utc>,
        localize: Option<&dyn Localize>,
        compact: bool,
    ) -> String {
        let timer_compact = compact || config.compact_format == CompactFormat::Always;

        if let Some(data) = self.explicit_timer(config, host, now) {
            return TimerEntityService::get_timer_subtitle(&data, config.show_seconds, localize, timer_compact);
        }

        if config.auto_discovery_enabled() {
            let shown = self
                .discover_timer(config, host, now)
                .or_else(|| self.last_known_timer.clone().filter(TimerData::is_finished));
            return match shown {
                Some(data) => {
                    TimerEntityService::get_timer_subtitle(&data, config.show_seconds, localize, timer_compact)
                }
                None => translate(localize, "timer.discovery.none", &[]),
            };
        }

        if config.target_date().is_none() {
            return String::new();
        }
        if self.expired {
            return config.expired_text.clone();
        }

        let text = compose_subtitle(&self.time_remaining, config, localize, compact);
        if text.is_empty() {
            return text;
        }
        format!(
            "{}{}{}",
            config.subtitle_prefix.as_deref().unwrap_or(""),
            text,
            config.subtitle_suffix.as_deref().unwrap_or("")
        )
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn get_time_remaining(&self) -> CountdownState {
        self.time_remaining
    }

    /// Timer behind the most recent update
    pub fn current_timer(&self) -> Option<&TimerData> {
        self.current_timer.as_ref()
    }

    pub fn last_known_timer(&self) -> Option<&TimerData> {
        self.last_known_timer.as_ref()
    }

    /// Back to a clean "no countdown" state
    pub fn reset(&mut self) {
        self.time_remaining = CountdownState::zero();
        self.expired = false;
        self.expired_target = None;
        self.current_timer = None;
    }

    fn explicit_timer(&self, config: &CardConfig, host: &HostSnapshot, now: DateTime<Utc>) -> Option<TimerData> {
        let entity_id = config.timer_entity()?;
        self.timers.get_timer_data(entity_id, host, now)
    }

    /// Discovered timer by priority active, then paused, then finished.
    /// Ties go to the earliest entity in scan order.
    fn discover_timer(&self, config: &CardConfig, host: &HostSnapshot, now: DateTime<Utc>) -> Option<TimerData> {
        let mut candidates = Vec::new();
        if config.auto_discover_alexa {
            candidates.extend(self.timers.get_available_alexa_timers(host, now));
        }
        if config.auto_discover_google {
            candidates.extend(self.timers.get_available_google_timers(host));
        }

        let discovered: Vec<TimerData> = candidates
            .iter()
            .filter_map(|id| self.timers.get_timer_data(id, host, now))
            .collect();

        let pick = |predicate: fn(&TimerData) -> bool| discovered.iter().find(|d| predicate(*d)).cloned();
        pick(TimerData::is_active)
            .or_else(|| pick(TimerData::is_paused))
            .or_else(|| pick(TimerData::is_finished))
    }

    fn apply_timer(&mut self, config: &CardConfig, data: TimerData) {
        let mask = UnitMask {
            months: false,
            ..UnitMask::from_config(config)
        };
        self.time_remaining = cascade_units(data.remaining().saturating_mul(SECOND_MS), 0, mask);
        self.expired = TimerEntityService::is_timer_expired(&data);
        self.expired_target = None;
        self.current_timer = Some(data);
    }

    fn update_calendar(&mut self, config: &CardConfig, now: DateTime<Utc>) {
        let Some(raw_target) = config.target_date() else {
            self.reset();
            return;
        };
        let target = parse_to_timestamp(raw_target, now);

        let latched = self.expired && self.expired_target == Some(target);
        if latched || target <= now {
            if !latched {
                info!("Countdown to {} expired", target.to_rfc3339());
            }
            self.expired = true;
            self.expired_target = Some(target);
            self.time_remaining = CountdownState::zero();
            return;
        }

        self.expired = false;
        self.expired_target = None;
        self.time_remaining = calendar_breakdown(now, target, UnitMask::from_config(config));
    }
}

/// Split `now..target` into display units.
///
/// Whole calendar months are counted by stepping a working date one month at
/// a time while it stays at or before the target. A day-of-month the next
/// month lacks rolls over into the month after, so the steps land on real
/// dates. The sub-month remainder is cascaded into the enabled smaller units.
pub fn calendar_breakdown(now: DateTime<Utc>, target: DateTime<Utc>, mask: UnitMask) -> CountdownState {
    let total_ms = millis_between(now, target);
    let mut working = now;
    let mut months = 0;

    if mask.months {
        loop {
            let next = add_month_overflowing(working);
            if next > target {
                break;
            }
            working = next;
            months += 1;
        }
    }

    let mut state = cascade_units(millis_between(working, target), months, mask);
    state.total_ms = total_ms;
    state
}

/// Distribute `remaining_ms` over the enabled day/hour/minute/second units.
/// A disabled unit's magnitude flows into the next enabled smaller unit.
pub fn cascade_units(remaining_ms: u64, months: u64, mask: UnitMask) -> CountdownState {
    let mut rest = remaining_ms;
    let mut take = |enabled: bool, unit_ms: u64| -> u64 {
        if !enabled {
            return 0;
        }
        let whole = rest / unit_ms;
        rest -= whole * unit_ms;
        whole
    };

    let days = take(mask.days, DAY_MS);
    let hours = take(mask.hours, HOUR_MS);
    let minutes = take(mask.minutes, MINUTE_MS);
    let seconds = take(mask.seconds, SECOND_MS);

    CountdownState {
        months,
        days,
        hours,
        minutes,
        seconds,
        total_ms: remaining_ms,
    }
}

/// `(now - creation) / (target - creation)` as a clamped percentage
pub fn calendar_progress(creation: DateTime<Utc>, target: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    if creation >= target {
        return 100.0;
    }
    let span = (target - creation).num_milliseconds() as f64;
    let elapsed = (now - creation).num_milliseconds() as f64;
    (elapsed / span * 100.0).clamp(0.0, 100.0)
}

fn millis_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_milliseconds().max(0) as u64
}

fn add_month_overflowing(at: DateTime<Utc>) -> DateTime<Utc> {
    let date = at.date_naive();
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.checked_add_days(Days::new(u64::from(date.day()) - 1)))
        .map(|shifted| Utc.from_utc_datetime(&shifted.and_time(at.time())))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A non-zero value in one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Part {
    value: u64,
    unit: &'static str,
}

/// Text for the enabled, non-zero units of `state`.
///
/// When every enabled unit rounds to zero, the highest non-zero unit of the
/// raw total is used instead so the text is never blank while time remains.
pub fn compose_subtitle(
    state: &CountdownState,
    config: &CardConfig,
    localize: Option<&dyn Localize>,
    force_compact: bool,
) -> String {
    let mut parts: Vec<Part> = [
        (config.show_months, state.months, "months"),
        (config.show_days, state.days, "days"),
        (config.show_hours, state.hours, "hours"),
        (config.show_minutes, state.minutes, "minutes"),
        (config.show_seconds, state.seconds, "seconds"),
    ]
    .into_iter()
    .filter(|(enabled, value, _)| *enabled && *value > 0)
    .map(|(_, value, unit)| Part { value, unit })
    .collect();

    if parts.is_empty() {
        let total = state.total_ms;
        let fallback = [
            (total / DAY_MS, "days"),
            (total % DAY_MS / HOUR_MS, "hours"),
            (total % HOUR_MS / MINUTE_MS, "minutes"),
            (total % MINUTE_MS / SECOND_MS, "seconds"),
        ]
        .into_iter()
        .find(|(value, _)| *value > 0);
        match fallback {
            Some((value, unit)) => parts.push(Part { value, unit }),
            None => return String::new(),
        }
    }

    if let [only] = parts.as_slice() {
        return spell_out(*only, localize);
    }

    let compact = force_compact
        || match config.compact_format {
            CompactFormat::Always => true,
            CompactFormat::Never => false,
            CompactFormat::Auto => parts.len() >= 3,
        };

    if compact {
        return parts
            .iter()
            .map(|p| {
                let short = translate(localize, &format!("unit.short.{}", p.unit), &[]);
                format!("{}{}", p.value, short)
            })
            .collect::<Vec<_>>()
            .join(" ");
    }

    let and = translate(localize, "join.and", &[]);
    let spelled: Vec<String> = parts.iter().map(|p| spell_out(*p, localize)).collect();
    match spelled.split_last() {
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} {} {}", rest.join(", "), and, last),
        None => String::new(),
    }
}

fn spell_out(part: Part, localize: Option<&dyn Localize>) -> String {
    let key = if part.value == 1 {
        format!("unit.{}", part.unit.trim_end_matches('s'))
    } else {
        format!("unit.{}", part.unit)
    };
    format!("{} {}", part.value, translate(localize, &key, &[]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const ALL: UnitMask = UnitMask {
        months: true,
        days: true,
        hours: true,
        minutes: true,
        seconds: true,
    };

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn to_ms(state: &CountdownState) -> u64 {
        state.days * DAY_MS + state.hours * HOUR_MS + state.minutes * MINUTE_MS + state.seconds * SECOND_MS
    }

    #[test]
    fn test_month_steps_roll_over_short_months() {
        assert_eq!(add_month_overflowing(at(2024, 1, 31, 8, 0, 0)), at(2024, 3, 2, 8, 0, 0));
        assert_eq!(add_month_overflowing(at(2023, 12, 15, 0, 0, 0)), at(2024, 1, 15, 0, 0, 0));
    }

    #[test]
    fn test_calendar_months_are_exact() {
        let months_only = UnitMask {
            months: true,
            days: false,
            hours: false,
            minutes: false,
            seconds: false,
        };
        let state = calendar_breakdown(at(2024, 1, 31, 0, 0, 0), at(2024, 4, 30, 0, 0, 0), months_only);
        assert_eq!(state.months, 2);
        assert_eq!(state.days, 0);
        assert_eq!(state.total_ms, 90 * DAY_MS);

        let with_days = UnitMask { days: true, ..months_only };
        let state = calendar_breakdown(at(2024, 1, 31, 0, 0, 0), at(2024, 4, 30, 0, 0, 0), with_days);
        assert_eq!((state.months, state.days), (2, 28));
    }

    #[test]
    fn test_cascading_never_loses_time() {
        let total = 3 * DAY_MS + 5 * HOUR_MS + 7 * MINUTE_MS + 11 * SECOND_MS;
        for bits in 0u8..8 {
            let mask = UnitMask {
                months: false,
                days: bits & 1 != 0,
                hours: bits & 2 != 0,
                minutes: bits & 4 != 0,
                seconds: true,
            };
            let state = cascade_units(total, 0, mask);
            assert_eq!(to_ms(&state), total, "mask {:?}", mask);
        }

        let hours_off = UnitMask { hours: false, ..ALL };
        let state = cascade_units(total, 0, hours_off);
        assert_eq!((state.days, state.hours, state.minutes), (3, 0, 5 * 60 + 7));
    }

    #[test]
    fn test_progress_edges() {
        let creation = at(2024, 1, 1, 0, 0, 0);
        let target = at(2024, 1, 11, 0, 0, 0);
        assert_eq!(calendar_progress(creation, target, at(2024, 1, 6, 0, 0, 0)), 50.0);
        assert_eq!(calendar_progress(creation, target, at(2023, 12, 1, 0, 0, 0)), 0.0);
        assert_eq!(calendar_progress(target, creation, creation), 100.0);
    }

    #[test]
    fn test_subtitle_unit_rules() {
        let config = CardConfig::for_target("x");
        let state = |ms: u64| cascade_units(ms, 0, UnitMask::from_config(&config));

        assert_eq!(compose_subtitle(&state(3 * HOUR_MS), &config, None, false), "3 hours");
        assert_eq!(compose_subtitle(&state(DAY_MS), &config, None, false), "1 day");
        assert_eq!(
            compose_subtitle(&state(10 * DAY_MS + 3 * HOUR_MS), &config, None, false),
            "10 days and 3 hours"
        );
        assert_eq!(
            compose_subtitle(&state(3 * HOUR_MS + 12 * MINUTE_MS + 5 * SECOND_MS), &config, None, false),
            "3h 12m 5s"
        );
        assert_eq!(
            compose_subtitle(&state(10 * DAY_MS + 3 * HOUR_MS), &config, None, true),
            "10d 3h"
        );

        let natural = CardConfig {
            compact_format: CompactFormat::Never,
            ..config.clone()
        };
        assert_eq!(
            compose_subtitle(&state(HOUR_MS + MINUTE_MS + SECOND_MS), &natural, None, false),
            "1 hour, 1 minute and 1 second"
        );
    }

    #[test]
    fn test_subtitle_falls_back_to_highest_raw_unit() {
        let days_only = CardConfig {
            show_hours: false,
            show_minutes: false,
            show_seconds: false,
            ..CardConfig::for_target("x")
        };
        let state = cascade_units(5 * HOUR_MS + 30 * MINUTE_MS, 0, UnitMask::from_config(&days_only));
        assert_eq!(compose_subtitle(&state, &days_only, None, false), "5 hours");
    }

    #[test]
    fn test_expired_latch_survives_clock_jitter() {
        let cache = std::sync::Arc::new(crate::state::TimerCache::new());
        let mut engine = CountdownEngine::new(TimerEntityService::new(cache));
        let config = CardConfig::for_target("2024-05-01T12:00:00Z");
        let host = HostSnapshot::new();
        let target = at(2024, 5, 1, 12, 0, 0);

        engine.update_countdown(&config, &host, target + Duration::seconds(1));
        assert!(engine.is_expired());

        // Host clock steps backwards by two seconds.
        let state = engine.update_countdown(&config, &host, target - Duration::seconds(1));
        assert!(engine.is_expired());
        assert!(state.is_zero());
        assert_eq!(engine.calculate_progress(&config, &host, target - Duration::seconds(1)), 100.0);
    }

    #[test]
    fn test_timer_remaining_beyond_range_saturates() {
        let cache = std::sync::Arc::new(crate::state::TimerCache::new());
        let mut engine = CountdownEngine::new(TimerEntityService::new(cache));
        let config = CardConfig::for_timer("timer.tea");
        let now = at(2024, 5, 1, 12, 0, 0);

        let mut host = HostSnapshot::new();
        host.insert(
            "timer.tea",
            crate::state::EntityState::new("idle").with_attribute("remaining", serde_json::json!(1e300)),
        );
        let state = engine.update_countdown(&config, &host, now);
        assert_eq!(state.total_ms, u64::MAX);
        assert_eq!(to_ms(&state), u64::MAX - u64::MAX % SECOND_MS);
        assert!(!engine.is_expired());

        host.insert(
            "timer.tea",
            crate::state::EntityState::new("active")
                .with_attribute("duration", serde_json::json!(60))
                .with_attribute("remaining", serde_json::json!("1000000000000000")),
        );
        let state = engine.update_countdown(&config, &host, now);
        assert_eq!(state.total_ms, 1_000_000_000_000_000 * SECOND_MS);
        assert_eq!(engine.current_timer().and_then(TimerData::finishes_at), None);
        assert_eq!(engine.calculate_progress(&config, &host, now), 0.0);
    }
}
