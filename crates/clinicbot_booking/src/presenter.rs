//! Text and button menus sent back to the user.

use chrono::{DateTime, NaiveDate, TimeZone};
use chrono_tz::Tz;
use clinicbot_common::models::{Booking, Button, OutgoingMessage, UserId};

use crate::dispatch::{BOOK, CANCEL_PREFIX, DATE_PREFIX, MY_BOOKINGS, TIME_PREFIX};
use crate::flow::ContactPolicy;

const DATE_LABEL: &str = "%a %d.%m.%Y";
const DATE_TIME_LABEL: &str = "%d.%m.%Y %H:%M";

/// Renders every reply of the bot in the clinic's time zone.
#[derive(Debug, Clone)]
pub struct Presenter {
    time_zone: Tz,
    contact: ContactPolicy,
}

impl Presenter {
    pub fn new(time_zone: Tz, contact: ContactPolicy) -> Self {
        Self { time_zone, contact }
    }

    fn local<T: TimeZone>(&self, instant: &DateTime<T>) -> DateTime<Tz> {
        instant.with_timezone(&self.time_zone)
    }

    pub fn main_menu(&self) -> OutgoingMessage {
        OutgoingMessage::text("Welcome! Choose an action:").with_buttons(vec![vec![
            Button::new("Book an appointment", BOOK),
            Button::new("My bookings", MY_BOOKINGS),
        ]])
    }

    pub fn unknown_command(&self) -> OutgoingMessage {
        OutgoingMessage::text("Unknown command. Use /help to see the available commands.")
    }

    pub fn unknown_action(&self) -> OutgoingMessage {
        OutgoingMessage::text("Unknown action.")
    }

    pub fn use_buttons(&self) -> OutgoingMessage {
        OutgoingMessage::text("Please use the buttons or commands.")
    }

    pub fn date_menu(&self, dates: &[NaiveDate]) -> OutgoingMessage {
        let rows = dates
            .iter()
            .map(|day| {
                vec![Button::new(
                    day.format(DATE_LABEL).to_string(),
                    format!("{DATE_PREFIX}{}", day.format("%Y-%m-%d")),
                )]
            })
            .collect();
        OutgoingMessage::text("Choose a date for your appointment:").with_buttons(rows)
    }

    pub fn invalid_date(&self) -> OutgoingMessage {
        OutgoingMessage::text("Invalid date format.")
    }

    pub fn slots_unavailable(&self) -> OutgoingMessage {
        OutgoingMessage::text("Could not load free slots. Please try again later.")
    }

    pub fn no_slots(&self) -> OutgoingMessage {
        OutgoingMessage::text("There are no free slots on the selected date.")
    }

    pub fn time_menu(&self, slots: &[DateTime<Tz>]) -> OutgoingMessage {
        let rows = slots
            .iter()
            .map(|slot| {
                vec![Button::new(
                    slot.format("%H:%M").to_string(),
                    format!("{TIME_PREFIX}{}", slot.to_rfc3339()),
                )]
            })
            .collect();
        OutgoingMessage::text("Choose a time for your appointment:").with_buttons(rows)
    }

    pub fn invalid_time(&self) -> OutgoingMessage {
        OutgoingMessage::text("Invalid time. Please pick one of the offered slots.")
    }

    pub fn stale_menu(&self) -> OutgoingMessage {
        OutgoingMessage::text("This menu is no longer active. Please choose a date again.")
            .with_buttons(vec![vec![Button::new("Book an appointment", BOOK)]])
    }

    pub fn ask_name(&self) -> OutgoingMessage {
        OutgoingMessage::text("Please enter your first and last name.")
    }

    pub fn ask_contact(&self) -> OutgoingMessage {
        OutgoingMessage::text("Thank you! Now please enter your phone number.")
    }

    pub fn invalid_contact(&self) -> OutgoingMessage {
        OutgoingMessage::text(format!(
            "Invalid phone number. Please enter it as {} ({} digits after {}).",
            self.contact.template(),
            self.contact.digits,
            self.contact.country_prefix
        ))
    }

    pub fn try_again(&self) -> OutgoingMessage {
        OutgoingMessage::text("Something went wrong. Please try again.")
    }

    pub fn slot_taken(&self) -> OutgoingMessage {
        OutgoingMessage::text("Sorry, this slot was just taken. Please choose another time.")
    }

    pub fn booked(&self, booking: &Booking, html_link: Option<&str>) -> OutgoingMessage {
        let when = self.local(&booking.appointment_at).format("%d.%m.%Y at %H:%M");
        let text = match html_link {
            Some(link) => format!("You are booked for {when}.\nEvent link: {link}"),
            None => format!("You are booked for {when}."),
        };
        OutgoingMessage::text(text)
    }

    pub fn rolled_back(&self) -> OutgoingMessage {
        OutgoingMessage::text("Could not save your booking. Please try again.")
    }

    pub fn contact_admin(&self) -> OutgoingMessage {
        OutgoingMessage::text("A critical error occurred. Please contact an administrator.")
    }

    pub fn bookings_unavailable(&self) -> OutgoingMessage {
        OutgoingMessage::text("Could not load your bookings.")
    }

    pub fn no_bookings(&self) -> OutgoingMessage {
        OutgoingMessage::text("You have no bookings yet.")
    }

    /// One message per booking, each with its own cancel button.
    pub fn booking_list(&self, bookings: &[Booking]) -> Vec<OutgoingMessage> {
        if bookings.is_empty() {
            return vec![self.no_bookings()];
        }
        bookings
            .iter()
            .map(|booking| {
                OutgoingMessage::text(format!(
                    "ID: {}\nName: {}\nPhone: {}\nDate/time: {}",
                    booking.id,
                    booking.name,
                    booking.contact,
                    self.local(&booking.appointment_at).format(DATE_TIME_LABEL)
                ))
                .with_buttons(vec![vec![Button::new(
                    "Cancel booking",
                    format!("{CANCEL_PREFIX}{}", booking.id),
                )]])
            })
            .collect()
    }

    pub fn invalid_booking_id(&self) -> OutgoingMessage {
        OutgoingMessage::text("Invalid booking id.")
    }

    pub fn booking_not_found(&self) -> OutgoingMessage {
        OutgoingMessage::text("Could not find the booking.")
    }

    pub fn cancel_calendar_failed(&self) -> OutgoingMessage {
        OutgoingMessage::text("Could not cancel the booking in the calendar. Please try again.")
    }

    pub fn cancel_diverged(&self) -> OutgoingMessage {
        OutgoingMessage::text(
            "A critical error occurred while cancelling. Please contact an administrator.",
        )
    }

    pub fn cancelled(&self) -> OutgoingMessage {
        OutgoingMessage::text("Your booking has been cancelled.")
    }

    /// Copy of a fresh booking for the administrator.
    pub fn admin_notice(&self, booking: &Booking, user: UserId) -> OutgoingMessage {
        OutgoingMessage::text(format!(
            "New booking #{}\nName: {}\nPhone: {}\nDate/time: {}\nUser: {}",
            booking.id,
            booking.name,
            booking.contact,
            self.local(&booking.appointment_at).format(DATE_TIME_LABEL),
            user
        ))
    }

    /// Plain listing for reports, without buttons.
    pub fn report_line(&self, booking: &Booking) -> String {
        let owner = booking
            .user_id
            .map(|u| u.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{:>5}  {}  {:<24} {:<16} user={}",
            booking.id,
            self.local(&booking.appointment_at).format(DATE_TIME_LABEL),
            booking.name,
            booking.contact,
            owner
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chrono_tz::Europe::Moscow;

    fn presenter() -> Presenter {
        Presenter::new(Moscow, ContactPolicy::default())
    }

    fn booking(id: i64) -> Booking {
        Booking {
            id,
            user_id: Some(UserId(42)),
            name: "Anna Petrova".into(),
            contact: "+79990001122".into(),
            appointment_at: Utc.with_ymd_and_hms(2025, 3, 3, 7, 0, 0).unwrap(),
            event_id: Some("evt-1".into()),
        }
    }

    #[test]
    fn main_menu_offers_both_actions() {
        assert_eq!(presenter().main_menu().payloads(), vec!["book", "my_bookings"]);
    }

    #[test]
    fn date_menu_uses_iso_payloads() {
        let days = [
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
        ];
        let menu = presenter().date_menu(&days);
        assert_eq!(menu.payloads(), vec!["date_2025-03-03", "date_2025-03-04"]);
        assert_eq!(menu.buttons[0][0].label, "Mon 03.03.2025");
    }

    #[test]
    fn time_menu_shows_local_hours_with_rfc3339_payloads() {
        let slot = Moscow.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap();
        let menu = presenter().time_menu(&[slot]);
        assert_eq!(menu.buttons[0][0].label, "10:00");
        assert_eq!(menu.payloads(), vec!["time_2025-03-03T10:00:00+03:00"]);
    }

    #[test]
    fn every_listed_booking_gets_its_own_cancel_button() {
        let messages = presenter().booking_list(&[booking(3), booking(9)]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].payloads(), vec!["cancel_3"]);
        assert_eq!(messages[1].payloads(), vec!["cancel_9"]);
        assert!(messages[0].text.contains("Date/time: 03.03.2025 10:00"));
    }

    #[test]
    fn empty_list_says_so() {
        let messages = presenter().booking_list(&[]);
        assert_eq!(messages, vec![presenter().no_bookings()]);
    }

    #[test]
    fn booked_message_includes_link_when_present() {
        let p = presenter();
        let with_link = p.booked(&booking(1), Some("https://calendar/evt-1"));
        assert_eq!(
            with_link.text,
            "You are booked for 03.03.2025 at 10:00.\nEvent link: https://calendar/evt-1"
        );
        assert!(!p.booked(&booking(1), None).text.contains("Event link"));
    }

    #[test]
    fn invalid_contact_names_the_format() {
        assert!(presenter().invalid_contact().text.contains("+7XXXXXXXXXX"));
    }
}
