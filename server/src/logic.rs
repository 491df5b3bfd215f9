use prompterlink_shared::{Message, Role};
use uuid::Uuid;

use crate::state::{
    DisplayPolicy, DisplaySlot, Outbound, PeerSender, Relay, CLOSE_DISPLAY_REPLACED,
    CLOSE_DISPLAY_TAKEN,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    Accepted,
    Rejected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// The registered display, unless it is the excluded connection.
    Display { except: Option<Uuid> },
    /// Every controller except the given one.
    Controllers { except: Option<Uuid> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Delivery {
    pub target: Target,
    pub message: Message,
}

impl Delivery {
    fn new(target: Target, message: Message) -> Self {
        Self { target, message }
    }
}

impl Relay {
    /// Adds a connection and queues the current state for it.
    pub fn register(&mut self, id: Uuid, role: Role, tx: PeerSender) -> Registration {
        match role {
            Role::Display => {
                if let Some(previous) = self.display.take() {
                    match self.policy {
                        DisplayPolicy::Reject => {
                            self.display = Some(previous);
                            let _ = tx.send(Outbound::Close {
                                code: CLOSE_DISPLAY_TAKEN,
                                reason: "another display is already connected",
                            });
                            return Registration::Rejected;
                        }
                        DisplayPolicy::Replace => {
                            let _ = previous.tx.send(Outbound::Close {
                                code: CLOSE_DISPLAY_REPLACED,
                                reason: "replaced by a newer display",
                            });
                        }
                    }
                }
                self.display = Some(DisplaySlot { id, tx: tx.clone() });
            }
            Role::Controller => {
                self.remotes.insert(id, tx.clone());
            }
        }
        let _ = tx.send(Outbound::Message(self.state_message()));
        Registration::Accepted
    }

    /// Forgets a connection. The display slot is only cleared when it still
    /// belongs to `id`, so a replaced display closing late cannot evict its
    /// successor.
    pub fn unregister(&mut self, id: Uuid) -> Option<Role> {
        if self.display_id() == Some(id) {
            self.display = None;
            return Some(Role::Display);
        }
        self.remotes.remove(&id).map(|_| Role::Controller)
    }

    /// Applies `message` to canonical state and decides where it goes.
    pub fn route(&mut self, sender: Uuid, message: Message) -> Vec<Delivery> {
        match message {
            Message::Command { .. } => {
                vec![Delivery::new(Target::Display { except: None }, message)]
            }
            Message::State { data } => {
                if self.display_id() != Some(sender) {
                    tracing::warn!(
                        conn = %sender,
                        "ignoring state snapshot from a non-display connection"
                    );
                    return Vec::new();
                }
                self.state.merge(&data);
                let state = self.state_message();
                vec![
                    Delivery::new(Target::Display { except: None }, state.clone()),
                    Delivery::new(Target::Controllers { except: None }, state),
                ]
            }
            Message::Text { data } => {
                self.state.text = data.clone();
                let text = Message::Text { data };
                vec![
                    Delivery::new(
                        Target::Display {
                            except: Some(sender),
                        },
                        text.clone(),
                    ),
                    Delivery::new(
                        Target::Controllers {
                            except: Some(sender),
                        },
                        text,
                    ),
                ]
            }
            Message::Landscape { .. } => vec![Delivery::new(
                Target::Display {
                    except: Some(sender),
                },
                message,
            )],
        }
    }

    /// Sends to live peers. Targets with nobody attached absorb the message;
    /// peers whose writer is gone are pruned.
    pub fn deliver(&mut self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            match delivery.target {
                Target::Display { except } => {
                    let Some(slot) = &self.display else {
                        continue;
                    };
                    if Some(slot.id) == except {
                        continue;
                    }
                    if slot.tx.send(Outbound::Message(delivery.message)).is_err() {
                        tracing::debug!(conn = %slot.id, "display writer gone, clearing slot");
                        self.display = None;
                    }
                }
                Target::Controllers { except } => {
                    let mut stale = Vec::new();
                    for (id, tx) in self.remotes.iter() {
                        if Some(*id) == except {
                            continue;
                        }
                        if tx.send(Outbound::Message(delivery.message.clone())).is_err() {
                            stale.push(*id);
                        }
                    }
                    for id in stale {
                        self.remotes.remove(&id);
                    }
                }
            }
        }
    }

    pub fn handle(&mut self, sender: Uuid, message: Message) {
        let deliveries = self.route(sender, message);
        self.deliver(deliveries);
    }

    fn state_message(&self) -> Message {
        Message::State {
            data: self.state.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use prompterlink_shared::{Command, SharedState, StateUpdate};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    use super::*;

    fn connect(relay: &mut Relay, role: Role) -> (Uuid, UnboundedReceiver<Outbound>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        assert_eq!(relay.register(id, role, tx), Registration::Accepted);
        assert!(matches!(
            rx.try_recv(),
            Ok(Outbound::Message(Message::State { .. }))
        ));
        (id, rx)
    }

    fn text(data: &str) -> Message {
        Message::Text { data: data.into() }
    }

    #[test]
    fn new_connection_gets_current_state() {
        let mut relay = Relay::new(DisplayPolicy::Replace);
        relay.state.speed = 42;
        let (tx, mut rx) = mpsc::unbounded_channel();
        relay.register(Uuid::new_v4(), Role::Controller, tx);
        match rx.try_recv() {
            Ok(Outbound::Message(Message::State { data })) => {
                assert_eq!(data.speed, Some(42));
                assert_eq!(data.is_playing, Some(false));
            }
            other => panic!("expected bootstrap state, got {other:?}"),
        }
    }

    #[test]
    fn text_skips_the_sender() {
        let mut relay = Relay::new(DisplayPolicy::Replace);
        let (_, mut display) = connect(&mut relay, Role::Display);
        let (a, mut remote_a) = connect(&mut relay, Role::Controller);
        let (_, mut remote_b) = connect(&mut relay, Role::Controller);

        relay.handle(a, text("hello"));

        assert_eq!(display.try_recv(), Ok(Outbound::Message(text("hello"))));
        assert_eq!(remote_b.try_recv(), Ok(Outbound::Message(text("hello"))));
        assert!(remote_a.try_recv().is_err());
        assert_eq!(relay.state.text, "hello");
    }

    #[test]
    fn text_from_display_is_not_echoed_back() {
        let mut relay = Relay::new(DisplayPolicy::Replace);
        let (display_id, mut display) = connect(&mut relay, Role::Display);
        let (_, mut remote) = connect(&mut relay, Role::Controller);

        relay.handle(display_id, text("script"));

        assert!(display.try_recv().is_err());
        assert_eq!(remote.try_recv(), Ok(Outbound::Message(text("script"))));
    }

    #[test]
    fn command_without_display_is_absorbed() {
        let mut relay = Relay::new(DisplayPolicy::Replace);
        let (a, mut remote_a) = connect(&mut relay, Role::Controller);
        let (_, mut remote_b) = connect(&mut relay, Role::Controller);
        let before = relay.state.clone();

        relay.handle(a, Message::command(Command::Rewind));

        assert!(remote_a.try_recv().is_err());
        assert!(remote_b.try_recv().is_err());
        assert_eq!(relay.state, before);
    }

    #[test]
    fn command_reaches_display_only() {
        let mut relay = Relay::new(DisplayPolicy::Replace);
        let (_, mut display) = connect(&mut relay, Role::Display);
        let (a, mut remote_a) = connect(&mut relay, Role::Controller);
        let (_, mut remote_b) = connect(&mut relay, Role::Controller);

        relay.handle(a, Message::command_with_value(Command::Speed, 20.0));

        assert_eq!(
            display.try_recv(),
            Ok(Outbound::Message(Message::command_with_value(
                Command::Speed,
                20.0
            )))
        );
        assert!(remote_a.try_recv().is_err());
        assert!(remote_b.try_recv().is_err());
    }

    #[test]
    fn display_snapshot_is_merged_and_broadcast() {
        let mut relay = Relay::new(DisplayPolicy::Replace);
        relay.state.text = "kept".into();
        let (display_id, mut display) = connect(&mut relay, Role::Display);
        let (_, mut remote) = connect(&mut relay, Role::Controller);

        relay.handle(
            display_id,
            Message::State {
                data: StateUpdate {
                    is_playing: Some(true),
                    speed: Some(10),
                    ..StateUpdate::default()
                },
            },
        );

        let expected = SharedState {
            is_playing: true,
            speed: 10,
            text: "kept".into(),
            ..SharedState::default()
        };
        assert_eq!(relay.state, expected);
        let full = Outbound::Message(Message::State {
            data: expected.snapshot(),
        });
        assert_eq!(display.try_recv(), Ok(full.clone()));
        assert_eq!(remote.try_recv(), Ok(full));
    }

    #[test]
    fn controller_snapshot_is_ignored() {
        let mut relay = Relay::new(DisplayPolicy::Replace);
        let (_, mut display) = connect(&mut relay, Role::Display);
        let (a, _remote) = connect(&mut relay, Role::Controller);

        relay.handle(
            a,
            Message::State {
                data: StateUpdate {
                    is_playing: Some(true),
                    ..StateUpdate::default()
                },
            },
        );

        assert!(!relay.state.is_playing);
        assert!(display.try_recv().is_err());
    }

    #[test]
    fn landscape_goes_to_display_and_is_not_stored() {
        let mut relay = Relay::new(DisplayPolicy::Replace);
        let (_, mut display) = connect(&mut relay, Role::Display);
        let (a, _remote_a) = connect(&mut relay, Role::Controller);
        let (_, mut remote_b) = connect(&mut relay, Role::Controller);
        let before = relay.state.clone();

        relay.handle(a, Message::Landscape { is_landscape: true });

        assert_eq!(
            display.try_recv(),
            Ok(Outbound::Message(Message::Landscape { is_landscape: true }))
        );
        assert!(remote_b.try_recv().is_err());
        assert_eq!(relay.state, before);
    }

    #[test]
    fn replacing_display_closes_previous() {
        let mut relay = Relay::new(DisplayPolicy::Replace);
        let (old_id, mut old) = connect(&mut relay, Role::Display);
        let (new_id, _new) = connect(&mut relay, Role::Display);

        assert!(matches!(
            old.try_recv(),
            Ok(Outbound::Close {
                code: CLOSE_DISPLAY_REPLACED,
                ..
            })
        ));
        assert_eq!(relay.display_id(), Some(new_id));

        // The replaced display disconnecting later must not clear the slot.
        assert_eq!(relay.unregister(old_id), None);
        assert_eq!(relay.display_id(), Some(new_id));
    }

    #[test]
    fn reject_policy_keeps_incumbent() {
        let mut relay = Relay::new(DisplayPolicy::Reject);
        let (first, _display) = connect(&mut relay, Role::Display);
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert_eq!(
            relay.register(Uuid::new_v4(), Role::Display, tx),
            Registration::Rejected
        );
        assert!(matches!(
            rx.try_recv(),
            Ok(Outbound::Close {
                code: CLOSE_DISPLAY_TAKEN,
                ..
            })
        ));
        assert_eq!(relay.display_id(), Some(first));
    }

    #[test]
    fn unregister_clears_roles() {
        let mut relay = Relay::new(DisplayPolicy::Replace);
        let (display_id, _display) = connect(&mut relay, Role::Display);
        let (remote_id, _remote) = connect(&mut relay, Role::Controller);

        assert_eq!(relay.unregister(display_id), Some(Role::Display));
        assert_eq!(relay.unregister(remote_id), Some(Role::Controller));
        assert!(relay.display.is_none());
        assert!(relay.remotes.is_empty());
        assert_eq!(relay.unregister(remote_id), None);
    }

    #[test]
    fn closed_peers_are_pruned() {
        let mut relay = Relay::new(DisplayPolicy::Replace);
        let (display_id, display) = connect(&mut relay, Role::Display);
        let (_, remote) = connect(&mut relay, Role::Controller);
        drop(remote);

        relay.handle(
            display_id,
            Message::State {
                data: StateUpdate::default(),
            },
        );
        assert!(relay.remotes.is_empty());

        drop(display);
        relay.handle(Uuid::new_v4(), Message::command(Command::Play));
        assert!(relay.display.is_none());
    }
}
