//! Non-fatal problems worth telling the user about.
//!
//! Commands keep working when a people source is missing or broken (attendee
//! names fall back to ids), so these are printed to stderr instead of failing.

use crate::config::Config;
use crate::people::PeopleDirectory;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Neither a static contact list nor a people webhook is configured.
    NoPeopleSource,
    /// The bundled contact list could not be read.
    StaticPeople(String),
    /// The people webhook failed.
    RemotePeople(String),
}

pub fn check_people(config: &Config, directory: &PeopleDirectory) -> Vec<Warning> {
    let mut warnings = Vec::new();

    let has_remote = config
        .people
        .remote_url
        .as_deref()
        .is_some_and(|u| !u.trim().is_empty());
    if config.people.static_path.is_none() && !has_remote {
        warnings.push(Warning::NoPeopleSource);
    }
    if let Some(message) = directory.static_error() {
        warnings.push(Warning::StaticPeople(message.to_string()));
    }
    if let Some(message) = directory.remote_error() {
        warnings.push(Warning::RemotePeople(message.to_string()));
    }

    warnings
}

pub fn format_warning(warning: &Warning) -> String {
    match warning {
        Warning::NoPeopleSource => "Warning: no people source configured \
            (people.static_path or people.remote_url), names fall back to ids"
            .to_string(),
        Warning::StaticPeople(message) => {
            format!("Warning: could not load the contact list: {}", message)
        }
        Warning::RemotePeople(message) => format!("Warning: {}", message),
    }
}
