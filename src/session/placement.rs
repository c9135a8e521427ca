use std::fmt;

/// Host and port of a worker able to serve a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkAddress {
    hostname: String,
    port: u16,
}

impl NetworkAddress {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hostname, self.port)
    }
}

/// A unit of work handed out by the planner: an opaque payload plus the
/// workers that can execute it, most preferred first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    id: String,
    task: Vec<u8>,
    locations: Vec<NetworkAddress>,
}

impl TaskInfo {
    pub fn new(id: impl Into<String>, task: Vec<u8>, locations: Vec<NetworkAddress>) -> Self {
        Self {
            id: id.into(),
            task,
            locations,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Serialized task payload, passed through to the worker untouched.
    pub fn task(&self) -> &[u8] {
        &self.task
    }

    pub fn locations(&self) -> &[NetworkAddress] {
        &self.locations
    }

    pub fn first_location(&self) -> Option<&NetworkAddress> {
        self.locations.first()
    }
}
