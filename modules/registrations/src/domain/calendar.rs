use std::time::Duration;

use icalendar::{Calendar, Component, Event as VEvent, EventLike};

use crate::contract::model::Event;
use crate::domain::ports::Attachment;

/// `<slug>.ics` with a single VEVENT spanning `duration` from the event date.
pub fn invite(event: &Event, duration: Duration) -> Attachment {
    let start = event.event_date;
    let end = start + chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::hours(2));

    let mut vevent = VEvent::new();
    vevent
        .uid(&format!("{}@registrations", event.id))
        .summary(&event.title)
        .description(&event.description)
        .starts(start)
        .ends(end);
    if let Some(location) = &event.location {
        vevent.location(location);
    }

    let mut calendar = Calendar::new();
    calendar.push(vevent.done());

    Attachment {
        filename: format!("{}.ics", event.slug),
        content_type: "text/calendar".to_string(),
        body: calendar.to_string(),
    }
}
