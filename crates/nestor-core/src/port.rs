//! Token exchange through ports
//!
//! `send` looks up every receiver reachable from an output port and hands
//! each one its own event: the first destination receives the token that
//! was passed in, every other destination an independent clone. Reads go
//! through the receivers of an input port, one receiver per linked
//! relation (a *channel*).

use crate::error::{Error, Result};
use crate::graph::{Destination, Graph, Side};
use crate::identity::{PortId, RelationId};
use crate::receiver::{Event, Receiver};
use crate::time::Time;
use crate::token::Token;
use tracing::warn;

/// Outcome of a send
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Receivers that accepted the token
    pub delivered: usize,
    /// Receivers that were full and rejected it
    pub rejected: usize,
}

impl Delivery {
    /// Whether every destination accepted the token
    pub fn is_complete(&self) -> bool {
        self.rejected == 0
    }

    fn merge(&mut self, other: Delivery) {
        self.delivered += other.delivered;
        self.rejected += other.rejected;
    }
}

impl Graph {
    /// Send a token out of an output port, stamped with `time`
    ///
    /// Having no destination is not an error.
    pub fn send(&mut self, port: PortId, token: Token, time: Time) -> Result<Delivery> {
        if !self.port(port)?.is_output() {
            return Err(Error::NotAnOutput {
                port: self.port_path(port),
            });
        }
        let destinations = self.destinations(port, Side::Outside);
        self.deliver(&destinations, token, time)
    }

    fn deliver(&mut self, destinations: &[Destination], token: Token, time: Time) -> Result<Delivery> {
        let mut delivery = Delivery::default();
        let Some((first, rest)) = destinations.split_first() else {
            return Ok(delivery);
        };
        let copies: Vec<Token> = rest.iter().map(|_| token.clone()).collect();
        for (destination, token) in std::iter::once(first)
            .zip(std::iter::once(token))
            .chain(rest.iter().zip(copies))
        {
            let receiver = self.receiver_at(*destination)?;
            if receiver.put(Event::new(token, time)) {
                delivery.delivered += 1;
            } else {
                delivery.rejected += 1;
                warn!(
                    port = %self.port_path(destination.port),
                    "receiver full, token rejected"
                );
            }
        }
        Ok(delivery)
    }

    fn receiver_at(&mut self, destination: Destination) -> Result<&mut Box<dyn Receiver>> {
        let missing = || {
            Error::UnknownEntity(format!(
                "receiver of {} on {}",
                self.port_path(destination.port),
                self.relation_path(destination.relation)
            ))
        };
        let exists = self.port(destination.port).is_ok_and(|p| match destination.side {
            Side::Outside => p.receivers.contains_key(&destination.relation),
            Side::Inside => p.inside_receivers.contains_key(&destination.relation),
        });
        if !exists {
            return Err(missing());
        }
        let port = self.port_mut(destination.port)?;
        let map = match destination.side {
            Side::Outside => &mut port.receivers,
            Side::Inside => &mut port.inside_receivers,
        };
        map.get_mut(&destination.relation)
            .ok_or_else(|| Error::UnknownEntity(format!("receiver on {}", destination.relation)))
    }

    fn ensure_input(&self, port: PortId) -> Result<()> {
        if !self.port(port)?.is_input() {
            return Err(Error::NotAnInput {
                port: self.port_path(port),
            });
        }
        Ok(())
    }

    /// Take the next event from the first channel of `port` holding one
    pub fn get_event(&mut self, port: PortId) -> Result<Event> {
        self.ensure_input(port)?;
        let path = self.port_path(port);
        let node = self.port_mut(port)?;
        match node.receivers.values_mut().find(|r| r.has_token()) {
            Some(receiver) => receiver.take_event(),
            None => Err(Error::EmptyQueue(path)),
        }
    }

    /// Take the next token from the first channel of `port` holding one
    pub fn get(&mut self, port: PortId) -> Result<Token> {
        self.get_event(port).map(|event| event.token)
    }

    /// Take the next token from channel `channel` of `port`
    pub fn get_channel(&mut self, port: PortId, channel: usize) -> Result<Token> {
        self.ensure_input(port)?;
        let path = self.port_path(port);
        let node = self.port_mut(port)?;
        let len = node.receivers.len();
        let (_, receiver) = node
            .receivers
            .get_index_mut(channel)
            .ok_or(Error::OffsetOutOfRange { offset: channel, len })?;
        if !receiver.has_token() {
            return Err(Error::EmptyQueue(format!("{path}[{channel}]")));
        }
        receiver.take()
    }

    /// Whether any channel of `port` holds a token
    pub fn has_token(&self, port: PortId) -> Result<bool> {
        self.ensure_input(port)?;
        Ok(self.port(port)?.receivers.values().any(|r| r.has_token()))
    }

    /// Earliest pending timestamp over the channels of `port`
    pub fn next_input_time(&self, port: PortId) -> Option<Time> {
        self.port(port)
            .ok()?
            .receivers
            .values()
            .filter_map(|r| r.next_time())
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Number of channels (receivers) of `port`
    pub fn channel_count(&self, port: PortId) -> usize {
        self.port(port).map(|p| p.receivers.len()).unwrap_or(0)
    }

    /// The receiver of `port` on `relation`
    pub fn receiver(&self, port: PortId, relation: RelationId) -> Option<&dyn Receiver> {
        self.port(port)
            .ok()?
            .receivers
            .get(&relation)
            .map(|r| r.as_ref())
    }

    /// Mutable access to the receiver of `port` on `relation`
    pub fn receiver_mut(&mut self, port: PortId, relation: RelationId) -> Option<&mut dyn Receiver> {
        match self.port_mut(port) {
            Ok(node) => match node.receivers.get_mut(&relation) {
                Some(receiver) => Some(receiver.as_mut()),
                None => None,
            },
            Err(_) => None,
        }
    }

    pub(crate) fn install_receiver(
        &mut self,
        port: PortId,
        relation: RelationId,
        side: Side,
        receiver: Box<dyn Receiver>,
    ) -> Result<()> {
        let node = self.port_mut(port)?;
        match side {
            Side::Outside => node.receivers.insert(relation, receiver),
            Side::Inside => node.inside_receivers.insert(relation, receiver),
        };
        Ok(())
    }

    /// Keep only the events buffered inside a composite's output port for
    /// which `keep` holds, in their original order
    ///
    /// Returns the number of events dropped.
    pub fn retain_inside_events(
        &mut self,
        port: PortId,
        mut keep: impl FnMut(&Event) -> bool,
    ) -> Result<usize> {
        let mut dropped = 0;
        for receiver in self.port_mut(port)?.inside_receivers.values_mut() {
            let mut pending = Vec::with_capacity(receiver.len());
            while receiver.has_token() {
                pending.push(receiver.take_event()?);
            }
            for event in pending {
                if keep(&event) {
                    receiver.put(event);
                } else {
                    dropped += 1;
                }
            }
        }
        Ok(dropped)
    }

    /// Move events from the outside receivers of a composite's input port
    /// to the receivers inside it, keeping each event's timestamp
    ///
    /// Returns whether anything was transferred.
    pub fn transfer_inputs(&mut self, port: PortId) -> Result<bool> {
        self.ensure_input(port)?;
        let mut pending = Vec::new();
        for receiver in self.port_mut(port)?.receivers.values_mut() {
            while receiver.has_token() {
                pending.push(receiver.take_event()?);
            }
        }
        if pending.is_empty() {
            return Ok(false);
        }
        let destinations = self.destinations(port, Side::Inside);
        let mut delivery = Delivery::default();
        for event in pending {
            delivery.merge(self.deliver(&destinations, event.token, event.time)?);
        }
        Ok(delivery.delivered > 0)
    }

    /// Move events from the inside receivers of a composite's output port
    /// to the receivers outside it, keeping each event's timestamp
    ///
    /// Returns whether anything was transferred.
    pub fn transfer_outputs(&mut self, port: PortId) -> Result<bool> {
        if !self.port(port)?.is_output() {
            return Err(Error::NotAnOutput {
                port: self.port_path(port),
            });
        }
        let mut pending = Vec::new();
        for receiver in self.port_mut(port)?.inside_receivers.values_mut() {
            while receiver.has_token() {
                pending.push(receiver.take_event()?);
            }
        }
        if pending.is_empty() {
            return Ok(false);
        }
        let destinations = self.destinations(port, Side::Outside);
        let mut delivery = Delivery::default();
        for event in pending {
            delivery.merge(self.deliver(&destinations, event.token, event.time)?);
        }
        Ok(delivery.delivered > 0)
    }
}
