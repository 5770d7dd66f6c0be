// Motion command types carried through the command queue

use std::fmt;
use std::str::FromStr;

use crate::config::MAX_CHANNELS;
use crate::error::MotionError;
use crate::servo::Channel;

/// Identifier assigned at submission; 16 bits, wraps
pub type MotionId = u16;

/// Which payload a motion carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionKind {
    Single,
    Group,
}

impl FromStr for MotionKind {
    type Err = MotionError;

    /// Accepts the document spellings: `single`/`s` and `parallel`/`p`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" | "s" => Ok(MotionKind::Single),
            "parallel" | "p" => Ok(MotionKind::Group),
            other => Err(MotionError::UnknownMotionKind(other.to_string())),
        }
    }
}

impl fmt::Display for MotionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MotionKind::Single => "single",
            MotionKind::Group => "parallel",
        })
    }
}

/// One channel moving to a target angle
#[derive(Debug, Clone, PartialEq)]
pub struct SingleMotion {
    pub channel: Channel,
    /// `None` means "start from wherever the servo is at dispatch time"
    pub start_angle: Option<f32>,
    pub target_angle: f32,
    pub duration_ms: u32,
}

/// Several channels moving in lockstep over a shared duration
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMotion {
    pub channels: Vec<Channel>,
    pub start_angles: Vec<Option<f32>>,
    pub target_angles: Vec<f32>,
    pub duration_ms: u32,
}

impl GroupMotion {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Motion {
    Single(SingleMotion),
    Group(GroupMotion),
}

impl Motion {
    pub fn kind(&self) -> MotionKind {
        match self {
            Motion::Single(_) => MotionKind::Single,
            Motion::Group(_) => MotionKind::Group,
        }
    }

    pub fn duration_ms(&self) -> u32 {
        match self {
            Motion::Single(m) => m.duration_ms,
            Motion::Group(m) => m.duration_ms,
        }
    }

    /// Check a payload is executable: a group needs 1..=MAX_CHANNELS channels
    /// with index-aligned angle arrays
    pub fn validate(&self) -> Result<(), MotionError> {
        let Motion::Group(group) = self else {
            return Ok(());
        };
        let count = group.channel_count();
        if count == 0 {
            return Err(MotionError::InvalidArgument(
                "group motion needs at least one channel".to_string(),
            ));
        }
        if count > MAX_CHANNELS {
            return Err(MotionError::too_many_channels(count));
        }
        if group.target_angles.len() != count || group.start_angles.len() != count {
            return Err(MotionError::InvalidArgument(format!(
                "{} channels but {} target and {} start angles",
                count,
                group.target_angles.len(),
                group.start_angles.len()
            )));
        }
        Ok(())
    }
}

/// A queued unit of work: owned by its queue slot, moved to the worker
#[derive(Debug, Clone, PartialEq)]
pub struct MotionCommand {
    pub id: MotionId,
    pub motion: Motion,
    /// Stop-all generation at submission; the worker drops commands from
    /// an earlier generation
    pub generation: u64,
}

impl MotionCommand {
    pub fn kind(&self) -> MotionKind {
        self.motion.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(channels: Vec<Channel>, targets: Vec<f32>) -> Motion {
        Motion::Group(GroupMotion {
            start_angles: vec![None; channels.len()],
            channels,
            target_angles: targets,
            duration_ms: 100,
        })
    }

    #[test]
    fn test_kind_from_document_spellings() {
        assert_eq!("single".parse::<MotionKind>().unwrap(), MotionKind::Single);
        assert_eq!("s".parse::<MotionKind>().unwrap(), MotionKind::Single);
        assert_eq!("parallel".parse::<MotionKind>().unwrap(), MotionKind::Group);
        assert_eq!("p".parse::<MotionKind>().unwrap(), MotionKind::Group);
        assert!(matches!(
            "Single".parse::<MotionKind>(),
            Err(MotionError::UnknownMotionKind(s)) if s == "Single"
        ));
    }

    #[test]
    fn test_validate_group_shapes() {
        assert!(group(vec![0, 1], vec![10.0, 20.0]).validate().is_ok());
        assert!(group(vec![], vec![]).validate().is_err());
        assert!(group(vec![0, 1], vec![10.0]).validate().is_err());
        assert!(group((0..9).collect(), vec![0.0; 9]).validate().is_err());
    }

    #[test]
    fn test_single_always_valid() {
        let single = Motion::Single(SingleMotion {
            channel: 200,
            start_angle: None,
            target_angle: -5.0,
            duration_ms: 0,
        });
        assert!(single.validate().is_ok());
        assert_eq!(single.kind(), MotionKind::Single);
    }
}
