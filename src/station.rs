use std::collections::VecDeque;

use serde::Serialize;

use super::city_graph::NodeCategory;
use super::vehicle::{Propulsion, VehicleId};


/// Energy price per km of range restored: 0.2 kWh/km at 0.30 per kWh for electric vehicles,
/// 0.08 L/km at 1.80 per litre for combustion vehicles.
const ELECTRIC_COST_PER_KM: f64 = 0.2 * 0.30;
const FUEL_COST_PER_KM: f64 = 0.08 * 1.80;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServiceSlot {
    pub vehicle: VehicleId,
    pub start_min: u32,
    pub est_completion_min: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StationStatus {
    Operational,
    OutOfService,
}

/// What happened to a vehicle that asked for service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceOutcome {
    Admitted,
    Queued,
    // the station is down and takes nobody, not even into the queue
    Refused,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StationStats {
    pub sessions_started: u32,
    pub sessions_completed: u32,
    pub busy_slot_minutes: f64,
    pub range_restored_km: f64,
    pub energy_billed: f64,
    pub max_queue_len: usize,
    pub failures: u32,
    pub downtime_min: f64,
}

/// A charging or fuel station: a fixed number of service slots and a FIFO queue for the
/// vehicles that arrive while every slot is taken.
///
/// A station can fail for a while.  While it is down, sessions in progress are paused, the
/// queue is held, and new arrivals are refused.
#[derive(Clone, Debug)]
pub struct Station {
    pub node: usize,
    pub category: NodeCategory,
    status: StationStatus,
    downtime_left_min: f64,
    capacity: usize,
    active: Vec<ServiceSlot>,
    queue: VecDeque<VehicleId>,
    stats: StationStats,
}

impl Station {
    /// A station always has at least one slot.
    pub fn new(node: usize, category: NodeCategory, capacity: u32) -> Station {
        Station {
            node,
            category,
            status: StationStatus::Operational,
            downtime_left_min: 0.0,
            capacity: capacity.max(1) as usize,
            active: vec![],
            queue: VecDeque::new(),
            stats: StationStats::default(),
        }
    }

    /// Whether a vehicle of this propulsion can get service here right now.
    pub fn serves(&self, propulsion: Propulsion) -> bool {
        self.is_operational() && self.category.serves(propulsion)
    }

    pub fn get_status(&self) -> StationStatus {
        self.status
    }

    pub fn is_operational(&self) -> bool {
        self.status == StationStatus::Operational
    }

    pub fn get_downtime_left_min(&self) -> f64 {
        self.downtime_left_min
    }

    /// Takes the station down for `duration_min` minutes.  Failing a station that is already
    /// down restarts its repair timer.
    pub fn fail(&mut self, duration_min: f64) {
        if self.is_operational() {
            self.stats.failures += 1;
        }
        self.status = StationStatus::OutOfService;
        self.downtime_left_min = duration_min.max(0.0);
    }

    pub fn repair(&mut self) {
        self.status = StationStatus::Operational;
        self.downtime_left_min = 0.0;
    }

    /// Counts down the repair timer.  Returns true if the station came back up.
    pub fn tick_downtime(&mut self, tick_min: f64) -> bool {
        if self.is_operational() {
            return false;
        }
        self.stats.downtime_min += tick_min;
        self.downtime_left_min -= tick_min;
        if self.downtime_left_min <= 0.0 {
            self.repair();
            return true;
        }
        false
    }

    pub fn get_capacity(&self) -> usize {
        self.capacity
    }

    pub fn get_active(&self) -> &Vec<ServiceSlot> {
        &self.active
    }

    pub fn get_queue(&self) -> &VecDeque<VehicleId> {
        &self.queue
    }

    pub fn get_stats(&self) -> &StationStats {
        &self.stats
    }

    pub fn is_full(&self) -> bool {
        self.active.len() >= self.capacity
    }

    pub fn is_serving(&self, vehicle: VehicleId) -> bool {
        self.active.iter().any(|slot| slot.vehicle == vehicle)
    }

    /// Starts a session if a slot is free, otherwise joins the queue.
    pub fn request_service(&mut self, vehicle: VehicleId, now_min: u32, est_duration_min: u32)
                           -> ServiceOutcome {
        if self.is_serving(vehicle) {
            return ServiceOutcome::Admitted;
        }
        if self.queue.contains(&vehicle) {
            return ServiceOutcome::Queued;
        }
        if !self.is_operational() {
            return ServiceOutcome::Refused;
        }
        if self.is_full() {
            self.queue.push_back(vehicle);
            self.stats.max_queue_len = self.stats.max_queue_len.max(self.queue.len());
            return ServiceOutcome::Queued;
        }
        self.start_session(vehicle, now_min, est_duration_min);
        return ServiceOutcome::Admitted;
    }

    fn start_session(&mut self, vehicle: VehicleId, now_min: u32, est_duration_min: u32) {
        self.active.push(ServiceSlot {
            vehicle,
            start_min: now_min,
            est_completion_min: now_min + est_duration_min,
        });
        self.stats.sessions_started += 1;
    }

    /// Pops the head of the queue into a free slot, if there is one.  `est_duration` gives the
    /// expected session length for the admitted vehicle.
    pub fn admit_next<F>(&mut self, now_min: u32, est_duration: F) -> Option<VehicleId>
        where F: Fn(VehicleId) -> u32
    {
        if self.is_full() || !self.is_operational() {
            return None;
        }
        let vehicle = self.queue.pop_front()?;
        self.start_session(vehicle, now_min, est_duration(vehicle));
        Some(vehicle)
    }

    /// Frees the vehicle's slot.  Returns false if it wasn't being served here.
    pub fn finish(&mut self, vehicle: VehicleId) -> bool {
        match self.active.iter().position(|slot| slot.vehicle == vehicle) {
            Some(pos) => {
                self.active.remove(pos);
                self.stats.sessions_completed += 1;
                true
            }
            None => false,
        }
    }

    /// Removes a vehicle from the station entirely, whether served or queued.
    pub fn withdraw(&mut self, vehicle: VehicleId) {
        if let Some(pos) = self.active.iter().position(|slot| slot.vehicle == vehicle) {
            self.active.remove(pos);
        }
        self.queue.retain(|vv| *vv != vehicle);
    }

    /// Books `km` of restored range for a vehicle of the given propulsion.
    pub fn record_recovery(&mut self, propulsion: Propulsion, km: f64) {
        self.stats.range_restored_km += km;
        self.stats.energy_billed += km * match propulsion {
            Propulsion::Electric => ELECTRIC_COST_PER_KM,
            Propulsion::Combustion => FUEL_COST_PER_KM,
        };
    }

    /// Called once per tick, after sessions have been updated.
    pub fn record_tick(&mut self, tick_min: f64) {
        self.stats.busy_slot_minutes += self.active.len() as f64 * tick_min;
    }

    /// Fraction of slots in use right now.
    pub fn utilization(&self) -> f64 {
        self.active.len() as f64 / self.capacity as f64
    }

    /// A rough wait for a vehicle arriving now: until the earliest slot frees up, plus one
    /// average session for every `capacity` vehicles already queued.
    pub fn estimated_wait_min(&self, now_min: u32) -> f64 {
        if !self.is_full() {
            return 0.0;
        }
        let earliest = self.active.iter().map(|slot| slot.est_completion_min).min()
                           .unwrap_or(now_min);
        let mean_session = self.active.iter()
            .map(|slot| (slot.est_completion_min - slot.start_min) as f64)
            .sum::<f64>() / self.active.len() as f64;
        let rounds = (self.queue.len() / self.capacity) as f64;
        earliest.saturating_sub(now_min) as f64 + rounds * mean_session
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_capacity_and_fifo() {
        let mut station = Station::new(3, NodeCategory::ChargingStation, 2);
        assert_eq!(station.request_service(VehicleId(0), 0, 10), ServiceOutcome::Admitted);
        assert_eq!(station.request_service(VehicleId(1), 0, 12), ServiceOutcome::Admitted);
        assert_eq!(station.request_service(VehicleId(2), 1, 10), ServiceOutcome::Queued);
        assert_eq!(station.request_service(VehicleId(3), 2, 10), ServiceOutcome::Queued);
        assert_eq!(station.get_active().len(), 2);
        assert_eq!(station.get_queue().len(), 2);
        // requesting twice changes nothing
        assert_eq!(station.request_service(VehicleId(2), 3, 10), ServiceOutcome::Queued);
        assert_eq!(station.get_queue().len(), 2);
        assert_eq!(station.admit_next(3, |_| 10), None);

        // release first, then the head of the queue gets in during the same tick
        assert!(station.finish(VehicleId(1)));
        assert_eq!(station.admit_next(5, |_| 10), Some(VehicleId(2)));
        assert_eq!(station.admit_next(5, |_| 10), None);
        assert_eq!(station.get_active().len(), 2);
        assert!(station.is_serving(VehicleId(2)));
        assert_eq!(station.get_queue().iter().cloned().collect::<Vec<_>>(),
                   vec![VehicleId(3)]);
        assert_eq!(station.get_stats().sessions_started, 3);
        assert_eq!(station.get_stats().sessions_completed, 1);
        assert_eq!(station.get_stats().max_queue_len, 2);
        assert!(!station.finish(VehicleId(3)));
    }

    #[test]
    fn test_minimum_capacity() {
        let mut station = Station::new(0, NodeCategory::FuelStation, 0);
        assert_eq!(station.get_capacity(), 1);
        assert_eq!(station.request_service(VehicleId(5), 0, 4), ServiceOutcome::Admitted);
        assert!(station.serves(Propulsion::Combustion));
        assert!(!station.serves(Propulsion::Electric));
    }

    #[test]
    fn test_withdraw_and_wait_estimate() {
        let mut station = Station::new(0, NodeCategory::Mixed, 1);
        assert_relative_eq!(station.estimated_wait_min(0), 0.0);
        station.request_service(VehicleId(0), 0, 10);
        station.request_service(VehicleId(1), 0, 10);
        assert_relative_eq!(station.estimated_wait_min(4), 6.0 + 10.0);
        station.withdraw(VehicleId(1));
        assert_relative_eq!(station.estimated_wait_min(4), 6.0);
        assert_relative_eq!(station.utilization(), 1.0);
        station.record_tick(1.0);
        station.record_recovery(Propulsion::Electric, 10.0);
        assert_relative_eq!(station.get_stats().busy_slot_minutes, 1.0);
        assert_relative_eq!(station.get_stats().energy_billed, 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_failure_and_repair() {
        let mut station = Station::new(0, NodeCategory::ChargingStation, 1);
        station.request_service(VehicleId(0), 0, 10);
        station.request_service(VehicleId(1), 0, 10);
        station.fail(2.5);
        assert_eq!(station.get_status(), StationStatus::OutOfService);
        assert!(!station.serves(Propulsion::Electric));
        assert_eq!(station.request_service(VehicleId(2), 1, 10), ServiceOutcome::Refused);
        // vehicles already there keep their place
        assert_eq!(station.request_service(VehicleId(1), 1, 10), ServiceOutcome::Queued);
        assert!(station.finish(VehicleId(0)));
        assert_eq!(station.admit_next(1, |_| 10), None);
        assert_eq!(station.get_queue().len(), 1);

        assert!(!station.tick_downtime(1.0));
        assert!(!station.tick_downtime(1.0));
        assert!(station.tick_downtime(1.0));
        assert!(station.is_operational());
        assert_eq!(station.admit_next(4, |_| 10), Some(VehicleId(1)));
        assert_eq!(station.get_stats().failures, 1);
        assert_relative_eq!(station.get_stats().downtime_min, 3.0);

        station.fail(30.0);
        station.fail(10.0);
        assert_eq!(station.get_stats().failures, 2);
        assert_relative_eq!(station.get_downtime_left_min(), 10.0);
        station.repair();
        assert!(station.serves(Propulsion::Electric));
        assert!(!station.tick_downtime(1.0));
    }
}
