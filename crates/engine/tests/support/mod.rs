//! Shared fixtures for the engine integration tests.
//!
//! Directory layout used throughout:
//!
//! | id | name        | role           | division |
//! |----|-------------|----------------|----------|
//! | 1  | Ana Reyes   | Employee       | MIS      |
//! | 2  | Ben Cruz    | DivisionChief  | MIS      |
//! | 3  | Carla Diaz  | Administrator  | MIS      |
//! | 4  | Dan Uy      | Ocd            | -        |
//! | 5  | Eli Tan     | Employee       | Planning |
//! | 6  | Fe Lim      | DivisionChief  | Planning |

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use officeflow_engine::{
    Actor, Clock, DirectoryData, Engine, EngineConfig, Role, StaticDirectory, TicketRequest,
};
use officeflow_storage::MemoryStorage;
use rust_decimal::Decimal;
use time::macros::datetime;
use time::OffsetDateTime;

pub type TestEngine = Engine<MemoryStorage, StaticDirectory>;

pub const DIRECTORY: &str = r#"{
    "employees": [
        {"id": 1, "name": "Ana Reyes", "division": "MIS"},
        {"id": 2, "name": "Ben Cruz", "division": "MIS"},
        {"id": 3, "name": "Carla Diaz", "division": "MIS"},
        {"id": 4, "name": "Dan Uy"},
        {"id": 5, "name": "Eli Tan", "division": "Planning"},
        {"id": 6, "name": "Fe Lim", "division": "Planning"}
    ],
    "divisions": [
        {"name": "MIS", "chief_id": 2,
         "weights": {"strategic": 20, "core": 70, "support": 10}},
        {"name": "Planning", "chief_id": 6}
    ],
    "plans": [
        {"id": 1, "success_indicator": "Helpdesk tickets closed", "function_type": "core", "personnel": [1]},
        {"id": 2, "success_indicator": "Network uptime", "function_type": "core", "personnel": [1]},
        {"id": 3, "success_indicator": "ICT plan drafted", "function_type": "strategic", "personnel": [1]},
        {"id": 4, "success_indicator": "Inventory updated", "function_type": "support", "personnel": [1, 5]}
    ]
}"#;

/// A clock tests can move forward.
#[derive(Debug)]
pub struct ManualClock(Mutex<OffsetDateTime>);

impl ManualClock {
    pub fn at(at: OffsetDateTime) -> Arc<Self> {
        Arc::new(Self(Mutex::new(at)))
    }

    pub fn set(&self, at: OffsetDateTime) {
        *self.0.lock().unwrap() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.0.lock().unwrap()
    }
}

pub fn ana() -> Actor {
    Actor::new(1, "Ana Reyes", Role::Employee)
}

pub fn ben() -> Actor {
    Actor::new(2, "Ben Cruz", Role::DivisionChief)
}

pub fn carla() -> Actor {
    Actor::new(3, "Carla Diaz", Role::Administrator)
}

pub fn dan() -> Actor {
    Actor::new(4, "Dan Uy", Role::Ocd)
}

pub fn eli() -> Actor {
    Actor::new(5, "Eli Tan", Role::Employee)
}

pub fn fe() -> Actor {
    Actor::new(6, "Fe Lim", Role::DivisionChief)
}

pub fn directory() -> StaticDirectory {
    StaticDirectory::new(serde_json::from_str::<DirectoryData>(DIRECTORY).unwrap()).unwrap()
}

pub fn engine_with(config: EngineConfig, clock: Arc<dyn Clock>) -> TestEngine {
    Engine::new(MemoryStorage::new(), directory(), config).with_clock(clock)
}

/// An engine whose clock reads 2025-09-15 10:00 UTC.
pub fn engine() -> TestEngine {
    engine_with(
        EngineConfig::default(),
        ManualClock::at(datetime!(2025-09-15 10:00 UTC)),
    )
}

pub fn printer_request() -> TicketRequest {
    TicketRequest {
        category: "Hardware".to_string(),
        title: "Printer jams on every job".to_string(),
        description: "The 3rd floor printer jams on duplex prints.".to_string(),
        division_chief_name: "Ben Cruz".to_string(),
        assigned_to: "MIS".to_string(),
    }
}

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}
