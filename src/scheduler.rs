use crate::protocol::{
    Accumulate, Command, CommandKind, FrameAccumulator, COMMAND_SPACING, RECEIVE_TIMEOUT,
};
use crate::Error;
use std::collections::VecDeque;
use std::time::Instant;

/// Half-duplex pacing of the command queue.
///
/// Nothing is transmitted while a frame is being received, and two
/// transmissions are always more than [`COMMAND_SPACING`] apart.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: VecDeque<Command>,
    receiver: FrameAccumulator,
    last_tx: Option<Instant>,
    last_rx: Option<Instant>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `command` and returns whatever may be transmitted right now.
    pub fn enqueue(&mut self, command: Command, now: Instant) -> Option<Command> {
        log::trace!("Queued {:?}", command.kind());
        self.queue.push_back(command);
        self.tick(now)
    }

    /// Feeds one received byte to the frame accumulator.
    pub fn receive(&mut self, byte: u8, now: Instant) -> Accumulate {
        let status = self.receiver.accumulate(byte);
        if let Accumulate::Continue = status {
            self.last_rx = Some(now);
        }
        status
    }

    /// Drops a stalled receive buffer, then pops the head command if it is due.
    pub fn tick(&mut self, now: Instant) -> Option<Command> {
        if let Some(stall) = self.expire_receive(now) {
            log::debug!("{stall}");
        }

        if let Some(last_tx) = self.last_tx {
            if now.saturating_duration_since(last_tx) <= COMMAND_SPACING {
                return None;
            }
        }
        if !self.receiver.is_empty() {
            return None;
        }

        let head = self.queue.front()?;
        if let (CommandKind::Delay(delay), Some(last_tx)) = (head.kind(), self.last_tx) {
            if now.saturating_duration_since(last_tx) < delay {
                return None;
            }
        }

        self.last_tx = Some(now);
        self.queue.pop_front()
    }

    fn expire_receive(&mut self, now: Instant) -> Option<Error> {
        if self.receiver.is_empty() {
            return None;
        }
        let stalled = self
            .last_rx
            .map_or(true, |last_rx| now.saturating_duration_since(last_rx) > RECEIVE_TIMEOUT);
        if !stalled {
            return None;
        }
        let discarded = self.receiver.len();
        self.receiver.clear();
        Some(Error::ReceiveStall(discarded))
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Queue drained and no frame in flight.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.receiver.is_empty()
    }

    pub fn last_transmission(&self) -> Option<Instant> {
        self.last_tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{handshake_sequence, CommandType, HANDSHAKE_PAUSE};
    use std::time::Duration;

    fn ms(start: Instant, millis: u64) -> Instant {
        start + Duration::from_millis(millis)
    }

    #[test]
    fn first_command_goes_out_immediately() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        let sent = scheduler.enqueue(Command::request(CommandType::Mode), start);
        assert_eq!(sent, Some(Command::request(CommandType::Mode)));
        assert!(scheduler.is_idle());
        assert_eq!(scheduler.last_transmission(), Some(start));
    }

    #[test]
    fn spacing_between_commands() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        assert!(scheduler
            .enqueue(Command::request(CommandType::Mode), start)
            .is_some());
        assert!(scheduler
            .enqueue(Command::request(CommandType::Fan), ms(start, 50))
            .is_none());
        assert!(scheduler.tick(ms(start, 100)).is_none());
        assert_eq!(
            scheduler.tick(ms(start, 101)),
            Some(Command::request(CommandType::Fan))
        );
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn pseudo_random_schedule_keeps_order_and_spacing() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        let mut seed: u32 = 0x1234_5678;
        let mut next = move || {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (seed >> 16) % 97
        };

        let mut now = start;
        let mut queued = 0u8;
        let mut sent = Vec::new();
        for _ in 0..400 {
            now += Duration::from_millis(u64::from(next()));
            let command = if next() % 3 == 0 && queued < 120 {
                queued += 1;
                scheduler.enqueue(Command::request(128 + queued), now)
            } else {
                scheduler.tick(now)
            };
            if let Some(command) = command {
                sent.push((now, command));
            }
        }
        while !scheduler.is_idle() {
            now += Duration::from_millis(10);
            if let Some(command) = scheduler.tick(now) {
                sent.push((now, command));
            }
        }

        assert_eq!(sent.len(), usize::from(queued));
        for (index, (_, command)) in sent.iter().enumerate() {
            assert_eq!(command.kind(), CommandKind::Request(129 + index as u8));
        }
        for pair in sent.windows(2) {
            assert!(pair[1].0.duration_since(pair[0].0) > COMMAND_SPACING);
        }
    }

    #[test]
    fn no_transmission_while_receiving() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.enqueue(Command::request(CommandType::Mode), start);
        assert!(matches!(
            scheduler.receive(0x02, ms(start, 150)),
            Accumulate::Continue
        ));
        assert!(scheduler
            .enqueue(Command::request(CommandType::Fan), ms(start, 160))
            .is_none());
        assert!(scheduler.tick(ms(start, 300)).is_none());
        assert!(!scheduler.is_idle());

        // Silence longer than the receive timeout releases the queue.
        assert_eq!(
            scheduler.tick(ms(start, 351)),
            Some(Command::request(CommandType::Fan))
        );
    }

    #[test]
    fn complete_frame_releases_queue() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        scheduler.enqueue(Command::request(CommandType::Mode), start);
        scheduler.enqueue(Command::request(CommandType::Fan), ms(start, 10));

        let reply = Command::set(CommandType::Mode, 66);
        let mut complete = None;
        for byte in reply.payload() {
            if let Accumulate::Complete(frame) = scheduler.receive(*byte, ms(start, 40)) {
                complete = Some(frame);
            }
        }
        assert_eq!(complete.as_deref(), Some(reply.payload()));
        assert_eq!(
            scheduler.tick(ms(start, 120)),
            Some(Command::request(CommandType::Fan))
        );
    }

    #[test]
    fn handshake_pause() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        let mut now = start;
        let mut sent = Vec::new();
        for command in handshake_sequence() {
            if let Some(command) = scheduler.enqueue(command, now) {
                sent.push((now, command));
            }
        }
        while !scheduler.is_idle() {
            now += Duration::from_millis(5);
            if let Some(command) = scheduler.tick(now) {
                sent.push((now, command));
            }
        }

        assert_eq!(sent.len(), 9);
        let (delay_at, delay) = &sent[6];
        assert_eq!(delay.kind(), CommandKind::Delay(HANDSHAKE_PAUSE));
        let (previous_at, _) = &sent[5];
        assert!(delay_at.duration_since(*previous_at) >= HANDSHAKE_PAUSE);
        let (after_at, _) = &sent[7];
        assert!(after_at.duration_since(*delay_at) > COMMAND_SPACING);
    }

    #[test]
    fn leading_delay_without_history_is_due() {
        let start = Instant::now();
        let mut scheduler = Scheduler::new();
        let sent = scheduler.enqueue(Command::delay(Duration::from_secs(5)), start);
        assert!(matches!(sent.map(|c| c.kind()), Some(CommandKind::Delay(_))));
    }
}
