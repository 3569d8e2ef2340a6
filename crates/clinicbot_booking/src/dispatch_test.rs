#[cfg(test)]
mod tests {
    use crate::dispatch::{ChatDispatcher, Command, Inbound};
    use crate::fakes::*;
    use crate::state::{ConversationState, Step};
    use clinicbot_common::models::{ChatId, UserId};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    const USER: UserId = UserId(42);
    const CHAT: ChatId = ChatId(42);
    const ADMIN: ChatId = ChatId(-1001);

    struct Bot {
        dispatcher: ChatDispatcher<FakeRepository>,
        transport: Arc<RecordingTransport>,
        calendar: Arc<FakeCalendar>,
        repository: Arc<FakeRepository>,
    }

    fn bot_with_admin(admin_id: Option<&str>) -> Bot {
        let h = harness();
        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = ChatDispatcher::new(h.flow, transport.clone(), admin_id.map(str::to_string))
            .with_clock(now);
        Bot {
            dispatcher,
            transport,
            calendar: h.calendar,
            repository: h.repository,
        }
    }

    fn bot() -> Bot {
        bot_with_admin(Some("-1001"))
    }

    impl Bot {
        async fn click(&self, payload: &str) {
            self.dispatcher
                .handle(
                    USER,
                    CHAT,
                    Inbound::Callback {
                        id: format!("cb-{payload}"),
                        payload: payload.to_string(),
                    },
                )
                .await;
        }

        async fn say(&self, text: &str) {
            self.dispatcher.handle(USER, CHAT, Inbound::from_text(text)).await;
        }

        async fn state(&self) -> ConversationState {
            self.dispatcher.conversations().snapshot(USER).await
        }

        async fn pick_monday_eleven(&self) {
            self.click("book").await;
            self.click("date_2025-03-03").await;
            self.click("time_2025-03-03T11:00:00+03:00").await;
        }

        fn last_text(&self) -> String {
            self.transport.last_to(CHAT).map(|m| m.text).unwrap_or_default()
        }
    }

    #[tokio::test]
    async fn start_shows_the_main_menu() {
        let bot = bot();
        bot.say("/start").await;

        let menu = bot.transport.last_to(CHAT).unwrap();
        assert_eq!(menu, bot.dispatcher.presenter().main_menu());
    }

    #[tokio::test]
    async fn commands_preempt_a_running_flow() {
        let bot = bot();
        bot.click("book").await;
        assert_eq!(bot.state().await.step(), Step::AwaitingDate);

        bot.dispatcher.handle(USER, CHAT, Inbound::Command(Command::Help)).await;
        assert!(bot.state().await.is_idle());
    }

    #[tokio::test]
    async fn unknown_command_leaves_state_alone() {
        let bot = bot();
        bot.click("book").await;
        bot.say("/prices").await;

        assert_eq!(bot.last_text(), bot.dispatcher.presenter().unknown_command().text);
        assert_eq!(bot.state().await.step(), Step::AwaitingDate);
    }

    #[tokio::test]
    async fn idle_text_asks_for_buttons() {
        let bot = bot();
        bot.say("hello").await;
        assert_eq!(bot.last_text(), bot.dispatcher.presenter().use_buttons().text);
        assert!(bot.state().await.is_idle());
    }

    #[tokio::test]
    async fn every_callback_is_acknowledged() {
        let bot = bot();
        bot.click("book").await;
        bot.click("nonsense").await;

        let acks = bot.transport.acks.lock().unwrap().clone();
        assert_eq!(acks, vec!["cb-book".to_string(), "cb-nonsense".to_string()]);
    }

    #[tokio::test]
    async fn unknown_action_does_not_touch_state() {
        let bot = bot();
        bot.click("book").await;
        bot.click("date_2025-03-03").await;
        let before = bot.state().await;

        bot.click("reschedule_5").await;
        assert_eq!(bot.last_text(), "Unknown action.");
        assert_eq!(bot.state().await, before);
    }

    #[tokio::test]
    async fn full_booking_conversation() {
        let bot = bot();
        bot.calendar.add_busy(monday_at(10), monday_at(11));

        bot.click("book").await;
        let dates = bot.transport.last_to(CHAT).unwrap();
        assert_eq!(dates.payloads().first(), Some(&"date_2025-03-03"));

        bot.click("date_2025-03-03").await;
        let times = bot.transport.last_to(CHAT).unwrap();
        assert_eq!(times.payloads().len(), 8);
        assert!(!times.payloads().contains(&"time_2025-03-03T10:00:00+03:00"));

        bot.click("time_2025-03-03T11:00:00+03:00").await;
        assert_eq!(bot.state().await.step(), Step::AwaitingName);

        bot.say("Anna Petrova").await;
        assert_eq!(bot.state().await.step(), Step::AwaitingContact);

        bot.say("+79990001122").await;
        assert!(bot.state().await.is_idle());
        assert!(bot.last_text().starts_with("You are booked for 03.03.2025 at 11:00."));

        let bookings = bot.repository.all();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].appointment_at, monday_at(11));

        let admin = bot.transport.texts_to(ADMIN);
        assert_eq!(admin.len(), 1);
        assert!(admin[0].contains("Anna Petrova"));
        assert!(admin[0].contains("03.03.2025 11:00"));
    }

    #[tokio::test]
    async fn invalid_phone_keeps_name_and_slot() {
        let bot = bot();
        bot.pick_monday_eleven().await;
        bot.say("Anna Petrova").await;

        bot.say("81234567890").await;
        assert_eq!(bot.last_text(), bot.dispatcher.presenter().invalid_contact().text);
        assert_eq!(
            bot.state().await,
            ConversationState::AwaitingContact {
                slot: monday_at(11),
                name: "Anna Petrova".into(),
            }
        );
        assert_eq!(bot.calendar.event_count(), 0);
    }

    #[tokio::test]
    async fn unparsable_admin_id_does_not_fail_the_booking() {
        let bot = bot_with_admin(Some("@front_desk"));
        bot.pick_monday_eleven().await;
        bot.say("Anna Petrova").await;
        bot.say("+79990001122").await;

        assert_eq!(bot.repository.all().len(), 1);
        let sent = bot.transport.sent.lock().unwrap().clone();
        assert!(sent.iter().all(|(chat, _)| *chat == CHAT));
    }

    #[tokio::test]
    async fn time_button_without_its_menu_is_ignored() {
        let bot = bot();
        bot.click("time_2025-03-03T11:00:00+03:00").await;
        assert_eq!(bot.last_text(), bot.dispatcher.presenter().stale_menu().text);
        assert!(bot.state().await.is_idle());

        bot.click("book").await;
        bot.click("date_2025-03-04").await;
        bot.click("time_2025-03-03T11:00:00+03:00").await;
        assert_eq!(bot.last_text(), bot.dispatcher.presenter().stale_menu().text);
        assert_eq!(
            bot.state().await,
            ConversationState::AwaitingTime {
                date: monday().succ_opt().unwrap()
            }
        );
    }

    #[tokio::test]
    async fn listing_and_cancelling_through_buttons() {
        let bot = bot();
        let event_id = bot.calendar.add_busy(monday_at(10), monday_at(11));
        let booking = bot.repository.insert(new_booking(42, 10, Some(&event_id)));
        bot.repository.insert(new_booking(7, 12, None));

        bot.click("my_bookings").await;
        let listing = bot.transport.last_to(CHAT).unwrap();
        assert_eq!(listing.payloads(), vec![format!("cancel_{}", booking.id).as_str()]);

        bot.click(&format!("cancel_{}", booking.id)).await;
        assert_eq!(bot.last_text(), "Your booking has been cancelled.");
        assert_eq!(bot.calendar.event_count(), 0);

        bot.click(&format!("cancel_{}", booking.id)).await;
        assert_eq!(bot.last_text(), "Could not find the booking.");
    }

    #[tokio::test]
    async fn empty_listing() {
        let bot = bot();
        bot.click("my_bookings").await;
        assert_eq!(bot.last_text(), "You have no bookings yet.");
    }

    #[tokio::test]
    async fn bad_payload_formats_are_validation_errors() {
        let bot = bot();
        bot.click("book").await;

        bot.click("date_tomorrow").await;
        assert_eq!(bot.last_text(), "Invalid date format.");
        bot.click("cancel_x").await;
        assert_eq!(bot.last_text(), "Invalid booking id.");
        assert_eq!(bot.state().await.step(), Step::AwaitingDate);
        assert_eq!(bot.calendar.event_count(), 0);
    }

    #[tokio::test]
    async fn calendar_outage_is_reported_and_resets() {
        let bot = bot();
        bot.calendar.fail_busy.store(true, Ordering::SeqCst);
        bot.click("book").await;
        bot.click("date_2025-03-03").await;

        assert_eq!(bot.last_text(), "Could not load free slots. Please try again later.");
        assert!(bot.state().await.is_idle());
    }

    #[tokio::test]
    async fn transport_failures_do_not_stop_the_flow() {
        let bot = bot();
        bot.transport.fail.store(true, Ordering::SeqCst);
        bot.click("book").await;
        bot.click("date_2025-03-03").await;

        assert_eq!(bot.state().await, ConversationState::AwaitingTime { date: monday() });
        assert!(bot.transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn users_do_not_share_state() {
        let bot = bot();
        bot.click("book").await;
        bot.dispatcher
            .handle(UserId(7), ChatId(7), Inbound::from_text("Boris"))
            .await;

        assert_eq!(bot.state().await.step(), Step::AwaitingDate);
        assert!(bot.dispatcher.conversations().snapshot(UserId(7)).await.is_idle());
        assert_eq!(
            bot.transport.texts_to(ChatId(7)),
            vec!["Please use the buttons or commands.".to_string()]
        );
    }
}
