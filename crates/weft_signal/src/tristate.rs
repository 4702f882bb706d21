//! Tristate buses resolved from any number of drivers.
//!
//! Each driver is a writable cell that is either driving a value or
//! released to `Undriven`. Whenever a driver commits a change, the bus
//! resolver scans the drivers in creation order: no active driver leaves the
//! bus undriven, one active driver puts its value on the bus, and more than
//! one is contention, reported as a `W101` warning with the bus undriven.

use weft_diagnostics::{codes, Diagnostic};

use crate::context::SimContext;
use crate::error::SignalError;
use crate::observer::{Observer, ObserverCtx};
use crate::signal::{SignalId, SignalRole, SignalState, SignalTable};
use crate::value::{Drive, Value};
use crate::waiter::{Edge, Waiter};

#[derive(Debug)]
pub(crate) struct BusResolver {
    bus: SignalId,
}

impl Observer for BusResolver {
    fn target(&self) -> SignalId {
        self.bus
    }

    fn sources(&self, signals: &SignalTable) -> Vec<SignalId> {
        match &signals.get(self.bus).role {
            SignalRole::TristateBus { drivers } => drivers.clone(),
            _ => Vec::new(),
        }
    }

    fn on_source_changed(&mut self, ctx: &mut ObserverCtx<'_>) -> Result<(), SignalError> {
        let active: Vec<SignalId> = self
            .sources(ctx.table())
            .into_iter()
            .filter(|d| !ctx.current(*d).is_undriven())
            .collect();

        let resolved = match active.as_slice() {
            [] => Value::Undriven,
            [only] => ctx.current(*only).clone(),
            many => {
                let bus = ctx.label(self.bus);
                let names: Vec<String> = many.iter().map(|d| ctx.label(*d)).collect();
                ctx.diagnostics().emit(
                    Diagnostic::warning(
                        codes::BUS_CONTENTION,
                        format!("{} drivers active on tristate bus {bus}", many.len()),
                    )
                    .with_signal(bus)
                    .with_time(ctx.now().time)
                    .with_note(format!("active drivers: {}", names.join(", ")))
                    .with_help("release all but one driver before enabling another"),
                );
                Value::Undriven
            }
        };
        ctx.drive(self.bus, resolved);
        Ok(())
    }
}

impl SimContext {
    /// Creates a tristate bus shaped like `prototype`, initially undriven.
    ///
    /// Only booleans and sized vectors can be put on a bus.
    pub fn tristate(&mut self, prototype: impl Into<Value>) -> Result<SignalId, SignalError> {
        let prototype = prototype.into();
        let kind = prototype
            .kind()
            .ok_or_else(|| SignalError::InvalidInit("a bus prototype needs a value".into()))?;
        if !kind.is_sized_bits() {
            return Err(SignalError::UnsupportedFieldType {
                index: 0,
                reason: format!("a tristate bus cannot carry a {}", kind.describe()),
            });
        }
        let bus = self.table.alloc(SignalState::new(
            kind,
            Value::Undriven,
            SignalRole::TristateBus {
                drivers: Vec::new(),
            },
        ));
        self.add_observer(Box::new(BusResolver { bus }));
        Ok(bus)
    }

    /// Adds a driver to `bus`. The driver starts released.
    pub fn driver(&mut self, bus: SignalId) -> Result<SignalId, SignalError> {
        let state = self.table.try_get(bus)?;
        let (kind, resolver) = match &state.role {
            SignalRole::TristateBus { .. } => (state.kind.clone(), state.observer),
            _ => return Err(SignalError::NotATristateBus(self.table.label(bus))),
        };
        let driver = self.table.alloc(SignalState::new(
            kind,
            Value::Undriven,
            SignalRole::TristateDriver { bus },
        ));
        if let SignalRole::TristateBus { drivers } = &mut self.table.get_mut(bus).role {
            drivers.push(driver);
        }
        if let Some(oid) = resolver {
            self.table
                .get_mut(driver)
                .waiters
                .register_once(Waiter::Observer(oid), Edge::Any);
        }
        Ok(driver)
    }

    /// Stops a driver from driving its bus.
    pub fn release(&mut self, driver: SignalId) -> Result<(), SignalError> {
        self.set_pending(driver, Drive::undriven())
    }
}
