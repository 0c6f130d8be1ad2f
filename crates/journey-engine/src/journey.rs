//! Journey state machine.
//!
//! [`apply`] is the whole transition table. [`transition`] runs it against
//! the stored row with a compare-and-set, so two writers for the same user
//! can never both advance it.

use chrono::{DateTime, Utc};
use database::{user, JourneyState, UserStatus};
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

/// Conditional writes tried before giving up on a contended user.
const MAX_CAS_ATTEMPTS: usize = 3;

/// Something that moves a user through the journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JourneyEvent {
    /// START: restart from day 1.
    Start,
    /// STOP: pause, keeping the day.
    Stop,
    /// Content for `day` was delivered.
    DayDelivered { day: i64, journey_length: i64 },
    /// The user is past the last day without a delivery to mark it.
    Complete,
}

/// Next state for `event`, or `None` if the event does not apply.
pub fn apply(state: &JourneyState, event: JourneyEvent, now: DateTime<Utc>) -> Option<JourneyState> {
    match event {
        JourneyEvent::Start => Some(JourneyState {
            status: UserStatus::Active,
            current_day: 1,
            join_date: now,
            completion_date: None,
        }),
        JourneyEvent::Stop => match state.status {
            UserStatus::Active => Some(JourneyState {
                status: UserStatus::Inactive,
                ..*state
            }),
            UserStatus::Inactive | UserStatus::Completed => None,
        },
        JourneyEvent::DayDelivered {
            day,
            journey_length,
        } => {
            if state.status != UserStatus::Active || state.current_day != day {
                return None;
            }
            if day >= journey_length {
                Some(JourneyState {
                    status: UserStatus::Completed,
                    current_day: day + 1,
                    completion_date: Some(now),
                    ..*state
                })
            } else {
                Some(JourneyState {
                    current_day: day + 1,
                    ..*state
                })
            }
        }
        JourneyEvent::Complete => match state.status {
            UserStatus::Active => Some(JourneyState {
                status: UserStatus::Completed,
                completion_date: Some(now),
                ..*state
            }),
            UserStatus::Inactive | UserStatus::Completed => None,
        },
    }
}

/// Result of a stored transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The write landed; this is the new state.
    Applied(JourneyState),
    /// The event does not apply to the current state, which is returned.
    Skipped(JourneyState),
}

impl Transition {
    pub fn applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }

    pub fn state(&self) -> &JourneyState {
        match self {
            Transition::Applied(state) | Transition::Skipped(state) => state,
        }
    }
}

/// Apply `event` to a stored user.
///
/// Re-reads and retries when another writer changed the row in between.
/// Fails with [`EngineError::Conflict`] if the row keeps changing.
pub async fn transition(
    pool: &SqlitePool,
    user_id: i64,
    event: JourneyEvent,
    now: DateTime<Utc>,
) -> Result<Transition> {
    for attempt in 1..=MAX_CAS_ATTEMPTS {
        let current = user::get_user(pool, user_id).await?.journey_state();

        let Some(next) = apply(&current, event, now) else {
            debug!("Event {:?} does not apply to user {} ({:?})", event, user_id, current.status);
            return Ok(Transition::Skipped(current));
        };

        if user::compare_and_set_state(pool, user_id, &current, &next).await? {
            debug!(
                "User {} {} day {} -> {} day {}",
                user_id, current.status, current.current_day, next.status, next.current_day
            );
            return Ok(Transition::Applied(next));
        }

        warn!(
            "Concurrent update on user {} (attempt {}/{})",
            user_id, attempt, MAX_CAS_ATTEMPTS
        );
    }

    Err(EngineError::Conflict { user_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use database::{Database, NewUser, Platform};

    fn state(status: UserStatus, day: i64) -> JourneyState {
        JourneyState {
            status,
            current_day: day,
            join_date: Utc::now() - Duration::days(30),
            completion_date: None,
        }
    }

    #[test]
    fn test_start_always_rewinds() {
        let now = Utc::now();
        for status in [UserStatus::Active, UserStatus::Inactive, UserStatus::Completed] {
            let next = apply(&state(status, 7), JourneyEvent::Start, now).unwrap();
            assert_eq!(next.status, UserStatus::Active);
            assert_eq!(next.current_day, 1);
            assert_eq!(next.join_date, now);
            assert_eq!(next.completion_date, None);
        }
    }

    #[test]
    fn test_stop_keeps_day() {
        let now = Utc::now();
        let next = apply(&state(UserStatus::Active, 5), JourneyEvent::Stop, now).unwrap();
        assert_eq!(next.status, UserStatus::Inactive);
        assert_eq!(next.current_day, 5);

        assert!(apply(&state(UserStatus::Inactive, 5), JourneyEvent::Stop, now).is_none());
    }

    #[test]
    fn test_delivery_advances_once() {
        let now = Utc::now();
        let event = JourneyEvent::DayDelivered {
            day: 2,
            journey_length: 3,
        };

        let next = apply(&state(UserStatus::Active, 2), event, now).unwrap();
        assert_eq!(next.current_day, 3);
        assert_eq!(next.status, UserStatus::Active);

        // Already advanced by someone else.
        assert!(apply(&next, event, now).is_none());
        // Inactive users are never advanced.
        assert!(apply(&state(UserStatus::Inactive, 2), event, now).is_none());
    }

    #[test]
    fn test_final_day_completes() {
        let now = Utc::now();
        let next = apply(
            &state(UserStatus::Active, 3),
            JourneyEvent::DayDelivered {
                day: 3,
                journey_length: 3,
            },
            now,
        )
        .unwrap();
        assert_eq!(next.status, UserStatus::Completed);
        assert_eq!(next.current_day, 4);
        assert_eq!(next.completion_date, Some(now));
    }

    #[tokio::test]
    async fn test_transition_against_store() {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1)
            .await
            .unwrap();
        db.migrate().await.unwrap();
        let bot = database::bot::create_bot(
            db.pool(),
            &database::NewBot::new("Bot", 3, database::DeliveryInterval::EveryMinutes { minutes: 10 }),
        )
        .await
        .unwrap();
        let created = user::create_user(
            db.pool(),
            &NewUser {
                bot_id: bot.id,
                platform: Platform::Telegram,
                sender_key: "tg_1".to_string(),
                status: UserStatus::Active,
                display_name: None,
                locale: None,
                source_ip: None,
                join_date: Utc::now(),
            },
        )
        .await
        .unwrap();

        let event = JourneyEvent::DayDelivered {
            day: 1,
            journey_length: 3,
        };
        let first = transition(db.pool(), created.id, event, Utc::now()).await.unwrap();
        assert!(first.applied());
        assert_eq!(first.state().current_day, 2);

        // The same delivery replayed is a no-op.
        let replay = transition(db.pool(), created.id, event, Utc::now()).await.unwrap();
        assert!(!replay.applied());
        assert_eq!(replay.state().current_day, 2);
    }
}
