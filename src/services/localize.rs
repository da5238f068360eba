//! Localization hook with built-in English strings
//!
//! Keys follow `timer.<vendor>.<state>.<variant>` for timer subtitles and
//! `unit.<name>` / `unit.short.<name>` for countdown units. Templates use
//! `{label}`, `{device}`, `{time}` placeholders.

/// Translate a key with named arguments. `None` means "no translation".
pub trait Localize {
    fn localize(&self, key: &str, args: &[(&str, &str)]) -> Option<String>;
}

impl<F> Localize for F
where
    F: Fn(&str, &[(&str, &str)]) -> Option<String>,
{
    fn localize(&self, key: &str, args: &[(&str, &str)]) -> Option<String> {
        self(key, args)
    }
}

/// Invariant English strings used whenever no localizer is supplied
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLocale;

impl Localize for DefaultLocale {
    fn localize(&self, key: &str, args: &[(&str, &str)]) -> Option<String> {
        default_template(key).map(|template| fill(template, args))
    }
}

/// Translate with `localize`, falling back to [`DefaultLocale`] and finally the key
pub fn translate(localize: Option<&dyn Localize>, key: &str, args: &[(&str, &str)]) -> String {
    localize
        .and_then(|l| l.localize(key, args))
        .or_else(|| DefaultLocale.localize(key, args))
        .unwrap_or_else(|| key.to_string())
}

/// Substitute `{name}` placeholders
pub fn fill(template: &str, args: &[(&str, &str)]) -> String {
    args.iter().fold(template.to_string(), |text, (name, value)| {
        text.replace(&format!("{{{}}}", name), value)
    })
}

fn default_template(key: &str) -> Option<&'static str> {
    let template = match key {
        "timer.standard.active.label" => "{label}: {time} remaining",
        "timer.standard.active.generic" => "{time} remaining",
        "timer.standard.paused.label" => "{label} paused with {time} left",
        "timer.standard.paused.generic" => "Paused with {time} left",
        "timer.standard.finished.label" => "{label} finished",
        "timer.standard.finished.generic" => "Timer finished",
        "timer.standard.none.label" => "{label} is idle",
        "timer.standard.none.generic" => "Timer is idle",

        "timer.alexa.active.label" => "{label}: {time} remaining",
        "timer.alexa.active.device" => "{device} timer: {time} remaining",
        "timer.alexa.active.generic" => "Alexa timer: {time} remaining",
        "timer.alexa.paused.label" => "{label} paused at {time}",
        "timer.alexa.paused.device" => "{device} timer paused at {time}",
        "timer.alexa.paused.generic" => "Alexa timer paused at {time}",
        "timer.alexa.finished.label" => "{label} is done!",
        "timer.alexa.finished.device" => "{device} timer is done!",
        "timer.alexa.finished.generic" => "Alexa timer is done!",
        "timer.alexa.none.device" => "No timers on {device}",
        "timer.alexa.none.generic" => "No active Alexa timers",

        "timer.google.active.label" => "{label}: {time} left",
        "timer.google.active.device" => "{device}: {time} left",
        "timer.google.active.generic" => "Google timer: {time} left",
        "timer.google.paused.label" => "{label} paused ({time} left)",
        "timer.google.paused.device" => "{device} timer paused ({time} left)",
        "timer.google.paused.generic" => "Google timer paused ({time} left)",
        "timer.google.finished.label" => "{label} finished!",
        "timer.google.finished.device" => "{device} timer finished!",
        "timer.google.finished.generic" => "Google timer finished!",
        "timer.google.none.device" => "No timers on {device}",
        "timer.google.none.generic" => "No active Google timers",

        "timer.compact.active" => "{time} left",
        "timer.compact.paused" => "Paused · {time}",
        "timer.compact.finished" => "Done!",
        "timer.compact.none" => "No timer",
        "timer.discovery.none" => "No active timers",

        "unit.month" => "month",
        "unit.months" => "months",
        "unit.day" => "day",
        "unit.days" => "days",
        "unit.hour" => "hour",
        "unit.hours" => "hours",
        "unit.minute" => "minute",
        "unit.minutes" => "minutes",
        "unit.second" => "second",
        "unit.seconds" => "seconds",
        "unit.short.months" => "mo",
        "unit.short.days" => "d",
        "unit.short.hours" => "h",
        "unit.short.minutes" => "m",
        "unit.short.seconds" => "s",
        "join.and" => "and",
        _ => return None,
    };
    Some(template)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_locale_fills_placeholders() {
        assert_eq!(
            translate(None, "timer.alexa.active.label", &[("label", "Eggs"), ("time", "4:00")]),
            "Eggs: 4:00 remaining"
        );
    }

    #[test]
    fn test_custom_localizer_falls_back_per_key() {
        let german = |key: &str, _args: &[(&str, &str)]| -> Option<String> {
            (key == "unit.days").then(|| "Tage".to_string())
        };
        assert_eq!(translate(Some(&german), "unit.days", &[]), "Tage");
        assert_eq!(translate(Some(&german), "unit.hours", &[]), "hours");
        assert_eq!(translate(Some(&german), "no.such.key", &[]), "no.such.key");
    }
}
