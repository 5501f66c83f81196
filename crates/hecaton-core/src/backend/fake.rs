// Hecaton Backend Layer - in-memory server for unit tests
// Keeps a device table and renders it the way xinput prints it

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use super::{Backend, BackendError};
use crate::device::{Kind, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Enumerate,
    ListProperties(Vec<u32>),
    CreateMaster(String),
    RemoveMaster(u32),
    Reattach(u32, u32),
    Disable(u32),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::Enumerate | Call::ListProperties(_))
    }
}

#[derive(Debug, Clone)]
struct Entry {
    id: u32,
    name: String,
    role: Role,
    kind: Kind,
    pair: u32,
}

/// Fake X server with the core pair (2, 3) and their XTEST slaves (4, 5)
pub struct FakeServer {
    devices: RefCell<Vec<Entry>>,
    props: RefCell<HashMap<u32, Vec<(String, u32, String)>>>,
    calls: RefCell<Vec<Call>>,
    next_id: Cell<u32>,
    /// When false, create-master succeeds but adds nothing
    pub honor_create: Cell<bool>,
    /// Device whose property block list-props leaves out, as if it was
    /// unplugged right after `list`
    pub vanish_before_props: Cell<Option<u32>>,
}

impl FakeServer {
    pub fn new() -> Self {
        let server = Self {
            devices: RefCell::new(Vec::new()),
            props: RefCell::new(HashMap::new()),
            calls: RefCell::new(Vec::new()),
            next_id: Cell::new(6),
            honor_create: Cell::new(true),
            vanish_before_props: Cell::new(None),
        };
        server.push(2, "Virtual core pointer", Role::Master, Kind::Pointer, 3);
        server.push(3, "Virtual core keyboard", Role::Master, Kind::Keyboard, 2);
        server.push(4, "Virtual core XTEST pointer", Role::Slave, Kind::Pointer, 2);
        server.push(5, "Virtual core XTEST keyboard", Role::Slave, Kind::Keyboard, 3);
        server
    }

    fn push(&self, id: u32, name: &str, role: Role, kind: Kind, pair: u32) {
        self.devices.borrow_mut().push(Entry {
            id,
            name: name.to_string(),
            role,
            kind,
            pair,
        });
        if id >= self.next_id.get() {
            self.next_id.set(id + 1);
        }
    }

    /// Plug in a slave attached to `master`, returning its id
    pub fn plug(&self, name: &str, kind: Kind, master: u32) -> u32 {
        let id = self.next_id.get();
        self.push(id, name, Role::Slave, kind, master);
        id
    }

    /// Give a device a property line as list-props would print it
    pub fn set_prop(&self, id: u32, label: &str, code: u32, raw: &str) {
        self.props
            .borrow_mut()
            .entry(id)
            .or_default()
            .push((label.to_string(), code, raw.to_string()));
    }

    /// Add a master pair directly, returning (pointer, keyboard) ids
    pub fn add_pair(&self, name: &str) -> (u32, u32) {
        let pointer = self.next_id.get();
        let keyboard = pointer + 1;
        self.push(pointer, &format!("{} pointer", name), Role::Master, Kind::Pointer, keyboard);
        self.push(keyboard, &format!("{} keyboard", name), Role::Master, Kind::Keyboard, pointer);
        let xtest_pointer = self.next_id.get();
        self.push(xtest_pointer, &format!("{} XTEST pointer", name), Role::Slave, Kind::Pointer, pointer);
        let xtest_keyboard = self.next_id.get();
        self.push(xtest_keyboard, &format!("{} XTEST keyboard", name), Role::Slave, Kind::Keyboard, keyboard);
        (pointer, keyboard)
    }

    pub fn master_id(&self, name: &str) -> Option<u32> {
        self.devices
            .borrow()
            .iter()
            .find(|d| d.role == Role::Master && d.name == name)
            .map(|d| d.id)
    }

    pub fn pair_of(&self, id: u32) -> Option<u32> {
        self.devices.borrow().iter().find(|d| d.id == id).map(|d| d.pair)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn fail(command: &str) -> BackendError {
        BackendError::Failed {
            command: command.to_string(),
            status: 1,
            stderr: "unable to find device".to_string(),
        }
    }
}

impl Backend for FakeServer {
    fn enumerate(&self) -> Result<String, BackendError> {
        self.record(Call::Enumerate);
        let mut out = String::new();
        for d in self.devices.borrow().iter() {
            let role = match d.role {
                Role::Master => "master",
                Role::Slave => "slave ",
            };
            out.push_str(&format!(
                "⎜   ↳ {:<40}\tid={}\t[{} {}  ({})]\n",
                d.name, d.id, role, d.kind, d.pair
            ));
        }
        Ok(out)
    }

    fn list_properties(&self, ids: &[u32]) -> Result<String, BackendError> {
        self.record(Call::ListProperties(ids.to_vec()));
        let devices = self.devices.borrow();
        let props = self.props.borrow();
        let mut out = String::new();
        for id in ids {
            if self.vanish_before_props.get() == Some(*id) {
                continue;
            }
            let name = devices
                .iter()
                .find(|d| d.id == *id)
                .map(|d| d.name.clone())
                .unwrap_or_default();
            out.push_str(&format!("Device '{}':\n", name));
            out.push_str("\tDevice Enabled (169):\t1\n");
            for (label, code, raw) in props.get(id).into_iter().flatten() {
                out.push_str(&format!("\t{} ({}):\t{}\n", label, code, raw));
            }
        }
        Ok(out)
    }

    fn create_master(&self, name: &str) -> Result<(), BackendError> {
        self.record(Call::CreateMaster(name.to_string()));
        if self.honor_create.get() {
            self.add_pair(name);
        }
        Ok(())
    }

    fn remove_master(&self, id: u32) -> Result<(), BackendError> {
        self.record(Call::RemoveMaster(id));
        let partner = {
            let devices = self.devices.borrow();
            devices
                .iter()
                .find(|d| d.id == id && d.role == Role::Master)
                .map(|d| d.pair)
                .ok_or_else(|| Self::fail("remove-master"))?
        };
        let mut devices = self.devices.borrow_mut();
        devices.retain(|d| d.id != id && d.id != partner);
        devices.retain(|d| !(d.role == Role::Slave && (d.pair == id || d.pair == partner) && d.name.contains("XTEST")));
        for d in devices.iter_mut() {
            if d.role == Role::Slave && (d.pair == id || d.pair == partner) {
                d.pair = if d.kind == Kind::Pointer { 2 } else { 3 };
            }
        }
        Ok(())
    }

    fn reattach(&self, slave: u32, master: u32) -> Result<(), BackendError> {
        self.record(Call::Reattach(slave, master));
        let mut devices = self.devices.borrow_mut();
        if !devices.iter().any(|d| d.id == master && d.role == Role::Master) {
            return Err(Self::fail("reattach"));
        }
        let device = devices
            .iter_mut()
            .find(|d| d.id == slave)
            .ok_or_else(|| Self::fail("reattach"))?;
        device.pair = master;
        Ok(())
    }

    fn disable(&self, id: u32) -> Result<(), BackendError> {
        self.record(Call::Disable(id));
        Ok(())
    }
}
