//! Read-only debug report, polled by an external logger.

use serde::Serialize;

use crate::power::PowerState;
use crate::whistle::VoicePhase;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiverReport {
    pub dial: f32,
    pub power: PowerState,
    pub master_volume: f32,
    pub ether_level: f32,
    pub stations: Vec<StationReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationReport {
    pub id: String,
    pub title: String,
    pub volume: f32,
    pub selected: bool,
    pub enabled: bool,
    pub ready: bool,
    pub playing: bool,
    pub whistle: Option<WhistleReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhistleReport {
    pub frequency: f32,
    pub gain: f32,
    pub target_gain: f32,
    pub phase: VoicePhase,
}

impl ReceiverReport {
    pub fn station(&self, id: &str) -> Option<&StationReport> {
        self.stations.iter().find(|s| s.id == id)
    }

    /// One-line summary for log output.
    pub fn summary(&self) -> String {
        let tuned = self
            .stations
            .iter()
            .filter(|s| s.selected)
            .map(|s| format!("{}={:.2}", s.id, s.volume))
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "dial={:.2} power={:?} master={:.2} ether={:.3} [{}]",
            self.dial, self.power, self.master_volume, self.ether_level, tuned
        )
    }
}
