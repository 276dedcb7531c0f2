use std::cmp::Ordering;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::vehicle::{Propulsion, VehicleId, VehicleKind};
use super::FleetError;


#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u32);

impl fmt::Display for RequestId {
    fn fmt(&self, ff: &mut fmt::Formatter) -> fmt::Result {
        write!(ff, "P{:04}", self.0)
    }
}

impl Serialize for RequestId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Ordered from least to most urgent.  A request's priority only ever goes up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Normal,
    Premium,
    Critical,
}

impl Priority {
    pub fn urgency_multiplier(&self) -> f64 {
        match self {
            Priority::Normal => 1.0,
            Priority::Premium => 3.0,
            Priority::Critical => 10.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
    Rejected,
    Expired,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        match self {
            RequestState::Completed | RequestState::Cancelled | RequestState::Rejected |
            RequestState::Expired => true,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvPreference {
    Indifferent,
    PrefersElectric,
    ElectricOnly,
}

impl EnvPreference {
    pub fn accepts(&self, propulsion: Propulsion) -> bool {
        !(*self == EnvPreference::ElectricOnly && propulsion != Propulsion::Electric)
    }
}

impl FromStr for EnvPreference {
    type Err = FleetError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_lowercase().as_str() {
            "indifferent" | "" => Ok(EnvPreference::Indifferent),
            "prefers_electric" => Ok(EnvPreference::PrefersElectric),
            "electric_only" => Ok(EnvPreference::ElectricOnly),
            _ => Err(FleetError::InvalidConfig(format!("unknown preference {}", name))),
        }
    }
}

/// What a deadline check did to a pending request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DeadlineStatus {
    OnTime,
    Escalated,
    // escalated_now is set if the same check also crossed the escalation threshold
    Expired { escalated_now: bool },
}

#[derive(Clone, Debug)]
pub struct Request {
    pub id: RequestId,
    pub origin: usize,
    pub destination: usize,
    pub passengers: u32,
    pub created_min: u32,
    pub max_wait_min: f64,
    pub preference: EnvPreference,
    premium: bool,
    priority: Priority,
    escalated: bool,
    state: RequestState,
    vehicle: Option<VehicleId>,
    assigned_min: Option<u32>,
    pickup_min: Option<u32>,
    completed_min: Option<u32>,
    pub trip_km: f64,
    pub fare: f64,
    satisfaction: Option<f64>,
    terminal_reason: Option<String>,
}

impl Request {
    pub fn new(id: RequestId, origin: usize, destination: usize, passengers: u32,
               created_min: u32, premium: bool, preference: EnvPreference, max_wait_min: f64)
               -> Request {
        Request {
            id,
            origin,
            destination,
            passengers,
            created_min,
            max_wait_min,
            preference,
            premium,
            priority: if premium { Priority::Premium } else { Priority::Normal },
            escalated: false,
            state: RequestState::Pending,
            vehicle: None,
            assigned_min: None,
            pickup_min: None,
            completed_min: None,
            trip_km: 0.0,
            fare: 0.0,
            satisfaction: None,
            terminal_reason: None,
        }
    }

    pub fn get_priority(&self) -> Priority {
        self.priority
    }

    pub fn get_state(&self) -> RequestState {
        self.state
    }

    pub fn get_vehicle(&self) -> Option<VehicleId> {
        self.vehicle
    }

    pub fn is_premium(&self) -> bool {
        self.premium
    }

    pub fn was_escalated(&self) -> bool {
        self.escalated
    }

    pub fn get_satisfaction(&self) -> Option<f64> {
        self.satisfaction
    }

    pub fn get_terminal_reason(&self) -> Option<&str> {
        self.terminal_reason.as_deref()
    }

    pub fn get_completed_min(&self) -> Option<u32> {
        self.completed_min
    }

    pub fn elapsed_min(&self, now_min: u32) -> f64 {
        now_min.saturating_sub(self.created_min) as f64
    }

    pub fn remaining_wait_min(&self, now_min: u32) -> f64 {
        (self.max_wait_min - self.elapsed_min(now_min)).max(0.0)
    }

    /// Minutes between creation and pickup, if the passengers have been picked up.
    pub fn pickup_wait_min(&self) -> Option<f64> {
        self.pickup_min.map(|pm| pm.saturating_sub(self.created_min) as f64)
    }

    pub fn accepts_vehicle(&self, kind: &VehicleKind) -> bool {
        self.preference.accepts(kind.propulsion)
    }

    /// Escalates a pending request to critical once it has used up `escalation_fraction` of
    /// its maximum wait, and expires it once the whole wait is used up.
    pub fn check_deadline(&mut self, now_min: u32, escalation_fraction: f64) -> DeadlineStatus {
        if self.state != RequestState::Pending {
            return DeadlineStatus::OnTime;
        }
        let fraction = if self.max_wait_min > 0.0 {
            self.elapsed_min(now_min) / self.max_wait_min
        } else {
            1.0
        };

        let mut escalated_now = false;
        if fraction >= escalation_fraction && !self.escalated {
            self.escalated = true;
            self.priority = Priority::Critical;
            escalated_now = true;
        }
        if fraction >= 1.0 {
            self.state = RequestState::Expired;
            self.terminal_reason = Some(format!("not assigned within {} minutes",
                                                self.max_wait_min));
            return DeadlineStatus::Expired {escalated_now};
        }
        if escalated_now {
            return DeadlineStatus::Escalated;
        }
        DeadlineStatus::OnTime
    }

    pub fn assign(&mut self, vehicle: VehicleId, now_min: u32) {
        self.vehicle = Some(vehicle);
        self.assigned_min = Some(now_min);
        self.state = RequestState::Assigned;
    }

    /// Returns an assigned or in-progress request to the pending pool, unbound from its vehicle.
    pub fn unassign(&mut self) {
        self.vehicle = None;
        self.assigned_min = None;
        self.pickup_min = None;
        self.state = RequestState::Pending;
    }

    pub fn pick_up(&mut self, now_min: u32, trip_km: f64) {
        self.pickup_min = Some(now_min);
        self.trip_km = trip_km;
        self.state = RequestState::InProgress;
    }

    /// Called when the passengers are dropped off.  `trip_km` is set at pickup.
    pub fn complete(&mut self, now_min: u32, fare: f64, served_by: &VehicleKind) {
        self.completed_min = Some(now_min);
        self.fare = fare;
        self.state = RequestState::Completed;
        let wait = self.pickup_wait_min().unwrap_or_else(|| self.elapsed_min(now_min));
        self.satisfaction = Some(self.compute_satisfaction(wait, served_by));
    }

    pub fn cancel(&mut self, reason: &str) {
        self.vehicle = None;
        self.state = RequestState::Cancelled;
        self.terminal_reason = Some(String::from(reason));
    }

    pub fn reject(&mut self, reason: &str) {
        self.state = RequestState::Rejected;
        self.terminal_reason = Some(String::from(reason));
    }

    /// A 0-100 score for a completed trip.
    pub fn compute_satisfaction(&self, wait_min: f64, served_by: &VehicleKind) -> f64 {
        let mut score = 100.0;
        if self.max_wait_min > 0.0 && wait_min > 0.5 * self.max_wait_min {
            score -= (wait_min / self.max_wait_min * 20.0).min(30.0);
        }
        match self.preference {
            EnvPreference::PrefersElectric if served_by.is_electric() => score += 10.0,
            EnvPreference::ElectricOnly if !served_by.is_electric() => score -= 20.0,
            _ => (),
        }
        if self.premium && wait_min > 5.0 {
            score -= 15.0;
        }
        score.max(0.0).min(100.0)
    }
}

/// Most urgent first, then oldest, then lowest id.
pub fn dispatch_order(r1: &Request, r2: &Request) -> Ordering {
    r2.priority.cmp(&r1.priority)
        .then(r1.created_min.cmp(&r2.created_min))
        .then(r1.id.cmp(&r2.id))
}


/// One row of a request schedule file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ScheduledRequest {
    pub time_min: u32,
    pub origin: String,
    pub destination: String,
    pub passengers: u32,
    #[serde(default)]
    pub premium: bool,
    #[serde(default = "default_preference")]
    pub preference: EnvPreference,
}

fn default_preference() -> EnvPreference {
    EnvPreference::Indifferent
}

impl ScheduledRequest {
    /// Reads a csv with columns time_min,origin,destination,passengers,premium,preference.
    /// Rows come back sorted by time.
    pub fn all_from_csv(csvpath: &Path) -> Result<Vec<ScheduledRequest>, FleetError> {
        let file = File::open(csvpath)?;
        let mut reader = csv::Reader::from_reader(file);
        let mut rows = vec![];
        for result in reader.deserialize() {
            let row: ScheduledRequest = result?;
            rows.push(row);
        }
        rows.sort_by_key(|row| row.time_min);
        Ok(rows)
    }
}
