//! Participation service
//!
//! Runs the participation rules against fresh snapshots from the store and
//! submits the resulting patches through the store's conditional write path.
//! The service keeps no event state of its own.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::DormConfig;
use crate::error::{Error, Result};
use crate::feed::SnapshotFeed;
use crate::models::{
    excerpt, ChatMessage, Event, EventDraft, MessageDisplay, ProfileSummary, ReplyPreview,
    SenderIdentity, Viewer,
};
use crate::notify::{Notification, NotificationDispatcher};
use crate::participation::{
    can_join, cross_dorm_notice_required, render_participants, resolve_sender_visibility,
    resolve_visibility, response_sheets, toggle_membership, Decision, JoinError, JoinOptions,
    ParticipantView, ResponseSheet, Visibility,
};
use crate::permissions::{EventAction, PermissionMatrix};
use crate::storage::{PatchOutcome, Storage};

const REPLY_EXCERPT_CHARS: usize = 80;

/// Result of a join/leave toggle
#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    /// Committed join; carries the snapshot read back after the write
    Joined(Event),
    /// Committed leave; carries the snapshot read back after the write
    Left(Event),
    /// Nothing was written
    Blocked(JoinError),
}

impl ToggleOutcome {
    pub fn event(&self) -> Option<&Event> {
        match self {
            ToggleOutcome::Joined(event) | ToggleOutcome::Left(event) => Some(event),
            ToggleOutcome::Blocked(_) => None,
        }
    }
}

/// What the join button should offer a viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPreview {
    pub is_member: bool,
    pub decision: Decision,
    pub visitor_notice_required: bool,
    pub needs_registration: bool,
    pub remaining_places: u32,
}

pub struct ParticipationService<S> {
    store: Arc<Mutex<S>>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    feed: SnapshotFeed,
    config: DormConfig,
}

impl<S: Storage> ParticipationService<S> {
    pub fn new(store: S, dispatcher: Arc<dyn NotificationDispatcher>, config: DormConfig) -> Self {
        Self::with_shared_store(Arc::new(Mutex::new(store)), dispatcher, config)
    }

    pub fn with_shared_store(
        store: Arc<Mutex<S>>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: DormConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            feed: SnapshotFeed::default(),
            config,
        }
    }

    pub fn feed(&self) -> &SnapshotFeed {
        &self.feed
    }

    pub fn config(&self) -> &DormConfig {
        &self.config
    }

    /// Name shown for masked participants
    pub fn anonymous_label(&self) -> &str {
        &self.config.participation.anonymous_label
    }

    fn with_store<T>(&self, f: impl FnOnce(&S) -> Result<T>) -> Result<T> {
        let guard = self.store.lock().map_err(|_| Error::LockPoisoned)?;
        f(&guard)
    }

    /// Fresh snapshot of an event
    pub fn event(&self, event_id: Uuid) -> Result<Event> {
        self.with_store(|s| s.find_event(event_id))?
            .ok_or_else(|| Error::NotFound(format!("Event {event_id}")))
    }

    /// Events of the viewer's dorm plus community-wide ones
    pub fn events_for(&self, viewer: &Viewer) -> Result<Vec<Event>> {
        self.with_store(|s| s.list_events_for_dorm(&viewer.home_dorm))
    }

    /// Events the viewer has joined
    pub fn joined_events(&self, viewer: &Viewer) -> Result<Vec<Event>> {
        self.with_store(|s| s.list_events_joined_by(viewer.id))
    }

    /// Create an event hosted by `host` and announce it to the dorm
    #[instrument(skip(self, host, draft), fields(host_id = %host.id))]
    pub fn create_event(&self, host: &Viewer, draft: EventDraft) -> Result<Event> {
        let event = Event::create(host, draft)?;
        self.with_store(|s| s.create_event(&event))?;
        info!(event_id = %event.id, owner_dorm = %event.owner_dorm, "Event created");

        self.feed.publish_event(&event);
        self.announce_event(&event);
        Ok(event)
    }

    /// Evaluate the join button for `viewer` without writing anything
    pub fn preview(&self, event_id: Uuid, viewer: &Viewer) -> Result<JoinPreview> {
        let event = self.event(event_id)?;
        Ok(JoinPreview {
            is_member: event.is_participant(viewer.id),
            decision: can_join(&event, viewer),
            visitor_notice_required: cross_dorm_notice_required(&event, viewer),
            needs_registration: event.has_registration(),
            remaining_places: event.remaining_places(),
        })
    }

    /// Join or leave an event depending on current membership.
    ///
    /// A lost conditional write is retried from a fresh read, so a race for
    /// the last place ends as `Blocked(Rejected(AlreadyFull))` for the loser.
    /// When retries run out the caller gets `Blocked(WriteConflict)`.
    #[instrument(skip(self, viewer, options), fields(viewer_id = %viewer.id))]
    pub fn toggle(&self, event_id: Uuid, viewer: &Viewer, options: &JoinOptions) -> Result<ToggleOutcome> {
        let attempts = self.config.participation.write_retries.saturating_add(1);

        for attempt in 1..=attempts {
            let event = self.event(event_id)?;

            let patch = match toggle_membership(&event, viewer, options) {
                Ok(patch) => patch,
                Err(reason) => {
                    debug!(%reason, "Join blocked");
                    return Ok(ToggleOutcome::Blocked(reason));
                }
            };

            let needs_notice = patch.is_join() && cross_dorm_notice_required(&event, viewer);
            if needs_notice
                && !options.visitor_rules_acknowledged
                && self
                    .with_store(|s| s.find_acknowledgement(event.id, viewer.id))?
                    .is_none()
            {
                return Ok(ToggleOutcome::Blocked(JoinError::VisitorRulesUnacknowledged));
            }

            match self.with_store(|s| s.apply_patch(&patch))? {
                PatchOutcome::Applied => {
                    // Only a committed join counts as having accepted the rules
                    if needs_notice && options.visitor_rules_acknowledged {
                        if let Err(err) =
                            self.with_store(|s| s.record_acknowledgement(event.id, viewer.id))
                        {
                            warn!(error = %err, "Visitor rules acknowledgement not stored");
                        }
                    }
                    let fresh = self.event(event_id)?;
                    self.feed.publish_event(&fresh);

                    return if patch.is_join() {
                        info!(participants = fresh.participants.len(), "Joined event");
                        self.notify_host_of_join(&fresh, viewer);
                        Ok(ToggleOutcome::Joined(fresh))
                    } else {
                        info!(participants = fresh.participants.len(), "Left event");
                        Ok(ToggleOutcome::Left(fresh))
                    };
                }
                PatchOutcome::Conflict => {
                    warn!(attempt, attempts, "Conditional write lost, re-reading event");
                }
            }
        }

        Ok(ToggleOutcome::Blocked(JoinError::WriteConflict))
    }

    /// Participant list as `viewer` may see it
    pub fn participants(&self, event_id: Uuid, viewer: &Viewer) -> Result<Vec<ParticipantView>> {
        let event = self.event(event_id)?;

        let revealed: Vec<Uuid> = event
            .participants
            .iter()
            .copied()
            .filter(|&p| resolve_visibility(&event, p, viewer) == Visibility::Revealed)
            .collect();
        let profiles = self.summaries(&revealed)?;

        Ok(render_participants(&event, viewer, |id| profiles.get(&id).cloned()))
    }

    /// Registration answers; host only
    pub fn registration_responses(&self, event_id: Uuid, viewer: &Viewer) -> Result<Vec<ResponseSheet>> {
        let event = self.event(event_id)?;
        response_sheets(&event, viewer).ok_or_else(|| {
            Error::PermissionDenied("Only the host can read registration responses".into())
        })
    }

    /// Delete an event with its chat and responses; host only
    #[instrument(skip(self, viewer), fields(viewer_id = %viewer.id))]
    pub fn delete_event(&self, event_id: Uuid, viewer: &Viewer) -> Result<()> {
        let event = self.event(event_id)?;
        if !PermissionMatrix::allows(&event, viewer.id, EventAction::DeleteEvent) {
            return Err(Error::PermissionDenied(
                "Only the host can delete an event".into(),
            ));
        }

        self.with_store(|s| s.delete_event(event_id))?;
        info!("Event deleted");
        self.feed.publish_deleted(event_id);

        if self.config.notifications.enabled {
            for participant in event.participants.iter().filter(|&&p| p != event.host_id) {
                self.dispatcher.dispatch(
                    Notification::to_user(
                        *participant,
                        "Event cancelled",
                        format!("\"{}\" has been cancelled by its host", event.title),
                    )
                    .with_payload(serde_json::json!({ "event_id": event_id })),
                );
            }
        }
        Ok(())
    }

    /// Post to an event's chat; host and participants only
    pub fn post_message(
        &self,
        event_id: Uuid,
        viewer: &Viewer,
        content: &str,
        reply_to: Option<Uuid>,
    ) -> Result<ChatMessage> {
        let event = self.event(event_id)?;
        if !PermissionMatrix::allows(&event, viewer.id, EventAction::PostMessage) {
            return Err(Error::PermissionDenied(
                "Join the event to take part in its chat".into(),
            ));
        }

        let content = content.trim();
        if content.is_empty() {
            return Err(Error::InvalidOperation("Message must not be empty".into()));
        }

        let mut message = ChatMessage::new(event_id, viewer.id, content.to_string())
            .posted_anonymously(event.anonymous_participants.contains(&viewer.id));
        if let Some(target) = reply_to {
            let quoted = self.with_store(|s| s.find_message(target))?;
            if !quoted.is_some_and(|m| m.event_id == event_id) {
                return Err(Error::InvalidOperation(
                    "Replies must quote a message from the same event".into(),
                ));
            }
            message = message.replying_to(target);
        }

        self.with_store(|s| s.create_message(&message))?;
        Ok(message)
    }

    /// Latest chat messages with sender identities resolved for `viewer`
    pub fn messages(&self, event_id: Uuid, viewer: &Viewer, limit: u32) -> Result<Vec<MessageDisplay>> {
        let event = self.event(event_id)?;
        if !PermissionMatrix::allows(&event, viewer.id, EventAction::ReadChat) {
            return Err(Error::PermissionDenied(
                "Join the event to read its chat".into(),
            ));
        }

        let messages = self.with_store(|s| s.list_messages(event_id, limit))?;
        let mut by_id: HashMap<Uuid, ChatMessage> =
            messages.iter().map(|m| (m.id, m.clone())).collect();

        // Quoted messages older than the window still need a preview
        for target in messages.iter().filter_map(|m| m.reply_to) {
            if !by_id.contains_key(&target) {
                if let Some(quoted) = self.with_store(|s| s.find_message(target))? {
                    by_id.insert(quoted.id, quoted);
                }
            }
        }

        let senders: Vec<Uuid> = by_id.values().map(|m| m.sender_id).collect();
        let profiles = self.summaries(&senders)?;
        let identity = |message: &ChatMessage| {
            match resolve_sender_visibility(&event, message, viewer) {
                Visibility::Masked => SenderIdentity::Masked,
                Visibility::Revealed => SenderIdentity::Revealed(
                    profiles
                        .get(&message.sender_id)
                        .cloned()
                        .unwrap_or_else(|| ProfileSummary::unknown(message.sender_id)),
                ),
            }
        };

        Ok(messages
            .into_iter()
            .map(|m| MessageDisplay {
                id: m.id,
                sender: identity(&m),
                reply_to: m.reply_to.and_then(|target| by_id.get(&target)).map(|quoted| {
                    ReplyPreview {
                        message_id: quoted.id,
                        sender: identity(quoted),
                        excerpt: excerpt(&quoted.content, REPLY_EXCERPT_CHARS),
                    }
                }),
                content: m.content,
                timestamp: m.created_at,
            })
            .collect())
    }

    fn summaries(&self, user_ids: &[Uuid]) -> Result<HashMap<Uuid, ProfileSummary>> {
        self.with_store(|s| {
            let mut out = HashMap::with_capacity(user_ids.len());
            for &user_id in user_ids {
                if out.contains_key(&user_id) {
                    continue;
                }
                if let Some(profile) = s.find_profile(user_id)? {
                    out.insert(user_id, profile.summary());
                }
            }
            Ok(out)
        })
    }

    /// Notification failures never undo or hide a committed join
    fn notify_host_of_join(&self, event: &Event, joiner: &Viewer) {
        if let Err(err) = self.try_notify_host_of_join(event, joiner) {
            warn!(event_id = %event.id, error = %err, "Join notification skipped");
        }
    }

    fn try_notify_host_of_join(&self, event: &Event, joiner: &Viewer) -> Result<()> {
        if !self.config.notifications.enabled || event.is_host(joiner.id) {
            return Ok(());
        }
        let prefs = self.with_store(|s| s.load_preferences(event.host_id))?;
        if !prefs.event_joins {
            debug!(host_id = %event.host_id, "Host muted join notifications");
            return Ok(());
        }

        // The host always sees real identities
        let name = self
            .with_store(|s| s.find_profile(joiner.id))?
            .map(|p| p.display_name)
            .unwrap_or_else(|| ProfileSummary::unknown(joiner.id).display_name);
        let suffix = if event.anonymous_participants.contains(&joiner.id) {
            " (anonymously)"
        } else {
            ""
        };

        self.dispatcher.dispatch(
            Notification::to_user(
                event.host_id,
                "New participant",
                format!("{name} joined \"{}\"{suffix}", event.title),
            )
            .with_payload(serde_json::json!({
                "event_id": event.id,
                "participants": event.participants.len(),
                "capacity": event.capacity,
            })),
        );
        Ok(())
    }

    fn announce_event(&self, event: &Event) {
        if let Err(err) = self.try_announce_event(event) {
            warn!(event_id = %event.id, error = %err, "New event announcement skipped");
        }
    }

    fn try_announce_event(&self, event: &Event) -> Result<()> {
        let notifications = &self.config.notifications;
        if !notifications.enabled || !notifications.announce_new_events {
            return Ok(());
        }

        let payload = serde_json::json!({ "event_id": event.id });
        let body = format!("{} on {}", event.title, event.starts_at.format("%Y-%m-%d %H:%M"));

        // Community-wide announcements fan out in the push service
        if event.owner_dorm.is_general() {
            self.dispatcher.dispatch(
                Notification::to_dorm(event.owner_dorm.clone(), "New event", body)
                    .with_payload(payload),
            );
            return Ok(());
        }

        let recipients = self.with_store(|s| {
            let mut out = Vec::new();
            for resident in s.list_residents(&event.owner_dorm)? {
                if resident.user_id != event.host_id
                    && s.load_preferences(resident.user_id)?.new_events
                {
                    out.push(resident.user_id);
                }
            }
            Ok(out)
        })?;

        for user_id in recipients {
            self.dispatcher.dispatch(
                Notification::to_user(user_id, "New event", body.clone()).with_payload(payload.clone()),
            );
        }
        Ok(())
    }
}
