use arena_shared::{ConnectionId, ParticipantId, ParticipantInfo, TeamColor, Vec3};

/// One arena combatant, owned by the connection registry from spawn until removal.
#[derive(Debug, Clone)]
pub struct ParticipantAgent {
    pub id: ParticipantId,
    pub connection: ConnectionId,
    pub display_name: String,
    pub team_color: TeamColor,
    pub spawn_position: Vec3,
    score: u32,
}

impl ParticipantAgent {
    pub fn new(
        id: ParticipantId,
        connection: ConnectionId,
        display_name: String,
        team_color: TeamColor,
        spawn_position: Vec3,
    ) -> Self {
        Self {
            id,
            connection,
            display_name,
            team_color,
            spawn_position,
            score: 0,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Scores one confirmed hit and returns the new total.
    pub(crate) fn award_point(&mut self) -> u32 {
        self.score += 1;
        self.score
    }

    pub fn info(&self) -> ParticipantInfo {
        ParticipantInfo {
            id: self.id,
            connection: self.connection,
            display_name: self.display_name.clone(),
            team_color: self.team_color,
            score: self.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_creation() {
        let agent = ParticipantAgent::new(
            5,
            2,
            "Rex".to_string(),
            TeamColor::for_connection(2),
            Vec3::new(1.0, 0.0, 2.0),
        );

        assert_eq!(agent.score(), 0);
        let info = agent.info();
        assert_eq!(info.id, 5);
        assert_eq!(info.connection, 2);
        assert_eq!(info.display_name, "Rex");
        assert_eq!(info.score, 0);
    }

    #[test]
    fn test_award_point_is_monotonic() {
        let mut agent =
            ParticipantAgent::new(1, 1, "A".to_string(), TeamColor::for_connection(1), Vec3::ZERO);

        assert_eq!(agent.award_point(), 1);
        assert_eq!(agent.award_point(), 2);
        assert_eq!(agent.info().score, 2);
    }
}
