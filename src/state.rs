use std::rc::Rc;

use super::city_graph::CityGraph;
use super::request::{DeadlineStatus, Request, RequestId, RequestState};
use super::vehicle::{MoveOutcome, Vehicle, VehicleId, VehicleKind};
use super::FleetError;


/// Everything the planner needs to reason about: the clock, the city, the fleet and the
/// requests.  Cloning is cheap; vehicles and requests are shared between clones until one of
/// them is modified, so planner branches only copy what they touch.
#[derive(Clone, Debug)]
pub struct SimulationState {
    clock_min: u32,
    graph: Rc<CityGraph>,
    // a vehicle's id is its index here
    vehicles: Vec<Rc<Vehicle>>,
    pending: Vec<Rc<Request>>,
    active: Vec<Rc<Request>>,
    finished: Vec<Rc<Request>>,
}

impl SimulationState {
    pub fn new(graph: CityGraph) -> SimulationState {
        SimulationState {
            clock_min: 0,
            graph: Rc::new(graph),
            vehicles: vec![],
            pending: vec![],
            active: vec![],
            finished: vec![],
        }
    }

    pub fn get_graph(&self) -> &CityGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut CityGraph {
        Rc::make_mut(&mut self.graph)
    }

    pub fn get_clock_min(&self) -> u32 {
        self.clock_min
    }

    pub fn advance_clock(&mut self, minutes: u32) {
        self.clock_min += minutes;
    }

    pub fn add_vehicle(&mut self, label: &str, kind: VehicleKind, location: usize) -> VehicleId {
        let id = VehicleId(self.vehicles.len());
        self.vehicles.push(Rc::new(Vehicle::new(id, label, kind, location)));
        id
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.iter().map(|vv| vv.as_ref())
    }

    pub fn get_num_vehicles(&self) -> usize {
        self.vehicles.len()
    }

    pub fn get_vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id.0).map(|vv| vv.as_ref())
    }

    pub fn vehicle_mut(&mut self, id: VehicleId) -> Option<&mut Vehicle> {
        self.vehicles.get_mut(id.0).map(Rc::make_mut)
    }

    /// Moves a vehicle along its route.  None if there's no such vehicle.
    pub fn advance_vehicle(&mut self, id: VehicleId, minutes: f64, max_edges: usize)
                           -> Option<MoveOutcome> {
        let graph = &self.graph;
        let vehicle = self.vehicles.get_mut(id.0)?;
        Some(Rc::make_mut(vehicle).advance(graph, minutes, max_edges))
    }

    pub fn add_request(&mut self, request: Request) {
        self.pending.push(Rc::new(request));
    }

    /// Stores a request that never entered the pending pool, eg. a rejected one.
    pub fn add_finished(&mut self, request: Request) {
        self.finished.push(Rc::new(request));
    }

    pub fn pending(&self) -> impl Iterator<Item = &Request> {
        self.pending.iter().map(|rr| rr.as_ref())
    }

    pub fn active(&self) -> impl Iterator<Item = &Request> {
        self.active.iter().map(|rr| rr.as_ref())
    }

    pub fn finished(&self) -> impl Iterator<Item = &Request> {
        self.finished.iter().map(|rr| rr.as_ref())
    }

    pub fn get_num_pending(&self) -> usize {
        self.pending.len()
    }

    pub fn get_request(&self, id: RequestId) -> Option<&Request> {
        self.pending.iter().chain(self.active.iter()).chain(self.finished.iter())
            .find(|rr| rr.id == id)
            .map(|rr| rr.as_ref())
    }

    /// Mutable access to a pending or active request.
    pub fn request_mut(&mut self, id: RequestId) -> Option<&mut Request> {
        self.pending.iter_mut().chain(self.active.iter_mut())
            .find(|rr| rr.id == id)
            .map(Rc::make_mut)
    }

    /// Escalates and expires pending requests.  Expired requests are moved to the finished
    /// list.  Returns every request whose status changed.
    pub fn check_deadlines(&mut self, escalation_fraction: f64)
                           -> Vec<(RequestId, DeadlineStatus)> {
        let now_min = self.clock_min;
        let mut changes = vec![];
        for request in self.pending.iter_mut() {
            let status = Rc::make_mut(request).check_deadline(now_min, escalation_fraction);
            if status != DeadlineStatus::OnTime {
                changes.push((request.id, status));
            }
        }

        let (expired, pending): (Vec<Rc<Request>>, Vec<Rc<Request>>) = self.pending.drain(..)
            .partition(|rr| rr.get_state() == RequestState::Expired);
        self.pending = pending;
        self.finished.extend(expired);
        changes
    }

    /// Binds an available vehicle to a pending request and moves the request to the active
    /// list.
    pub fn assign(&mut self, vehicle_id: VehicleId, request_id: RequestId)
                  -> Result<(), FleetError> {
        let now_min = self.clock_min;
        match self.get_vehicle(vehicle_id) {
            Some(vehicle) if vehicle.is_available() => (),
            Some(vehicle) => return Err(FleetError::VehicleUnavailable(
                format!("{} is {}", vehicle.label, vehicle.get_state()))),
            None => return Err(FleetError::UnknownVehicle(format!("{:?}", vehicle_id))),
        }
        let pos = match self.pending.iter().position(|rr| rr.id == request_id) {
            Some(pos) => pos,
            None => return Err(FleetError::UnknownRequest(request_id.to_string())),
        };

        let mut request = self.pending.remove(pos);
        Rc::make_mut(&mut request).assign(vehicle_id, now_min);
        let passengers = request.passengers;
        self.active.push(request);
        if let Some(vehicle) = self.vehicle_mut(vehicle_id) {
            vehicle.assign(request_id, passengers);
        }
        Ok(())
    }

    /// Sends an active request back to the pending pool, unbound from its vehicle.  The vehicle
    /// itself is left alone.
    pub fn requeue(&mut self, request_id: RequestId) -> Result<(), FleetError> {
        let pos = match self.active.iter().position(|rr| rr.id == request_id) {
            Some(pos) => pos,
            None => return Err(FleetError::UnknownRequest(request_id.to_string())),
        };
        let mut request = self.active.remove(pos);
        Rc::make_mut(&mut request).unassign();
        self.pending.push(request);
        Ok(())
    }

    /// Moves a request that has reached a terminal state to the finished list.
    pub fn archive(&mut self, request_id: RequestId) -> Result<(), FleetError> {
        if let Some(pos) = self.active.iter().position(|rr| rr.id == request_id) {
            let request = self.active.remove(pos);
            self.finished.push(request);
            return Ok(());
        }
        if let Some(pos) = self.pending.iter().position(|rr| rr.id == request_id) {
            let request = self.pending.remove(pos);
            self.finished.push(request);
            return Ok(());
        }
        Err(FleetError::UnknownRequest(request_id.to_string()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::super::request::EnvPreference;
    use super::super::test_utils::square_city;
    use super::super::vehicle::{Propulsion, VehicleCategory, VehicleState};

    fn state_with_request(max_wait: f64) -> SimulationState {
        let graph = square_city();
        let aa = graph.resolve("A").unwrap();
        let cc = graph.resolve("C").unwrap();
        let mut state = SimulationState::new(graph);
        let kind = VehicleKind::new(VehicleCategory::Standard, Propulsion::Electric);
        state.add_vehicle("T_E1", kind, aa);
        state.add_request(Request::new(RequestId(1), aa, cc, 1, 0, false,
                                       EnvPreference::Indifferent, max_wait));
        state
    }

    #[test]
    fn test_branches_are_isolated() {
        let state = state_with_request(60.);
        let mut branch = state.clone();
        branch.assign(VehicleId(0), RequestId(1)).unwrap();

        assert_eq!(branch.get_vehicle(VehicleId(0)).unwrap().get_state(),
                   VehicleState::EnRouteToPickup);
        assert_eq!(branch.get_num_pending(), 0);
        assert_eq!(branch.get_request(RequestId(1)).unwrap().get_state(),
                   RequestState::Assigned);
        // the first copy is untouched
        assert!(state.get_vehicle(VehicleId(0)).unwrap().is_available());
        assert_eq!(state.get_num_pending(), 1);
        assert_eq!(state.get_request(RequestId(1)).unwrap().get_state(), RequestState::Pending);
    }

    #[test]
    fn test_assign_checks() {
        let mut state = state_with_request(60.);
        assert!(matches!(state.assign(VehicleId(3), RequestId(1)),
                         Err(FleetError::UnknownVehicle(_))));
        assert!(matches!(state.assign(VehicleId(0), RequestId(9)),
                         Err(FleetError::UnknownRequest(_))));
        state.assign(VehicleId(0), RequestId(1)).unwrap();
        assert!(state.assign(VehicleId(0), RequestId(1)).is_err());
    }

    #[test]
    fn test_requeue_and_archive() {
        let mut state = state_with_request(60.);
        state.assign(VehicleId(0), RequestId(1)).unwrap();
        state.requeue(RequestId(1)).unwrap();
        let request = state.get_request(RequestId(1)).unwrap();
        assert_eq!(request.get_state(), RequestState::Pending);
        assert_eq!(request.get_vehicle(), None);

        state.request_mut(RequestId(1)).unwrap().cancel("operator");
        state.archive(RequestId(1)).unwrap();
        assert_eq!(state.finished().count(), 1);
        assert!(state.archive(RequestId(1)).is_err());
    }

    #[test]
    fn test_deadlines_move_expired_requests() {
        let mut state = state_with_request(10.);
        state.advance_clock(6);
        assert!(state.check_deadlines(0.7).is_empty());
        state.advance_clock(1);
        assert_eq!(state.check_deadlines(0.7), vec![(RequestId(1), DeadlineStatus::Escalated)]);
        state.advance_clock(2);
        assert!(state.check_deadlines(0.7).is_empty());
        state.advance_clock(1);
        assert_eq!(state.check_deadlines(0.7),
                   vec![(RequestId(1), DeadlineStatus::Expired {escalated_now: false})]);
        assert_eq!(state.get_num_pending(), 0);
        assert_eq!(state.finished().next().unwrap().get_state(), RequestState::Expired);
    }
}
