//! Movement capability. The authority decides who moves and how hard; the
//! collaborator that owns the rigid bodies carries it out.

use arena_shared::{MotionCommand, ParticipantId, Vec3};

pub trait Mover {
    fn apply_impulse(&mut self, id: ParticipantId, direction: Vec3, magnitude: f32);
    fn apply_rotation(&mut self, id: ParticipantId, euler_delta: Vec3, speed: f32);
}

/// Records motion for the transport to relay to the clients that simulate bodies.
#[derive(Debug, Default)]
pub struct MotionBuffer {
    commands: Vec<MotionCommand>,
}

impl MotionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[MotionCommand] {
        &self.commands
    }

    pub fn drain(&mut self) -> Vec<MotionCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl Mover for MotionBuffer {
    fn apply_impulse(&mut self, id: ParticipantId, direction: Vec3, magnitude: f32) {
        self.commands.push(MotionCommand::Impulse {
            id,
            direction,
            magnitude,
        });
    }

    fn apply_rotation(&mut self, id: ParticipantId, euler_delta: Vec3, speed: f32) {
        self.commands.push(MotionCommand::Rotate {
            id,
            euler_delta,
            speed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motion_buffer_records_in_order() {
        let mut buffer = MotionBuffer::new();
        buffer.apply_rotation(1, Vec3::new(0.0, 90.0, 0.0), 720.0);
        buffer.apply_impulse(1, Vec3::new(1.0, 0.0, 0.0), 6.0);

        let commands = buffer.drain();

        assert_eq!(commands.len(), 2);
        assert!(matches!(commands[0], MotionCommand::Rotate { id: 1, .. }));
        assert!(matches!(
            commands[1],
            MotionCommand::Impulse { id: 1, magnitude, .. } if magnitude == 6.0
        ));
        assert!(buffer.commands().is_empty());
    }
}
