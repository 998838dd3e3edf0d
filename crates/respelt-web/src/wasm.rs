#![forbid(unsafe_code)]

//! `wasm-bindgen` exports.
//!
//! Only compiled on `wasm32` targets.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Display;
use std::rc::{Rc, Weak};

use js_sys::{Array, Function, Promise, Reflect};
use respelt_core::{
    CreateElement, DomError, ResponsiveChain, ResponsiveElt, ResponsiveError, WakeHook,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::Node;

use crate::dom::{WebDom, js_message};
use crate::options::{ChainOptions, OptionsError};
use crate::settle::{FirstArmGate, Settlement, failure_report};

fn console_error(msg: &str) {
    let global = js_sys::global();
    let Ok(console) = Reflect::get(&global, &"console".into()) else {
        return;
    };
    let Ok(error) = Reflect::get(&console, &"error".into()) else {
        return;
    };
    let Ok(error_fn) = error.dyn_into::<Function>() else {
        return;
    };
    let _ = error_fn.call1(&console, &JsValue::from_str(msg));
}

fn install_panic_hook() {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = if let Some(loc) = info.location() {
                format!(
                    "respelt panic at {}:{}:{}: {info}",
                    loc.file(),
                    loc.line(),
                    loc.column()
                )
            } else {
                format!("respelt panic: {info}")
            };
            console_error(&msg);
        }));
    });
}

#[wasm_bindgen(start)]
pub fn wasm_start() {
    install_panic_hook();
}

fn js_error(err: impl Display) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

fn node_arg(value: &JsValue) -> Result<Node, JsValue> {
    value
        .dyn_ref::<Node>()
        .cloned()
        .ok_or_else(|| js_error(ResponsiveError::NotAnElement))
}

fn measure(
    elt: &JsValue,
    read: fn(&WebDom, &Node) -> Result<f64, DomError>,
) -> Result<f64, JsValue> {
    let node = node_arg(elt)?;
    let dom = WebDom::new(false).map_err(js_error)?;
    read(&dom, &node).map_err(js_error)
}

/// Rendered width of `elt` in pixels.
#[wasm_bindgen]
pub fn width(elt: &JsValue) -> Result<f64, JsValue> {
    measure(elt, respelt_core::width::<WebDom>)
}

/// Rendered height of `elt` in pixels.
#[wasm_bindgen]
pub fn height(elt: &JsValue) -> Result<f64, JsValue> {
    measure(elt, respelt_core::height::<WebDom>)
}

/// Computed font size of `elt` in pixels; `NaN` when it does not parse.
#[wasm_bindgen(js_name = fontSize)]
pub fn font_size(elt: &JsValue) -> Result<f64, JsValue> {
    measure(elt, respelt_core::font_size::<WebDom>)
}

#[wasm_bindgen(js_name = emWidth)]
pub fn em_width(elt: &JsValue) -> Result<f64, JsValue> {
    measure(elt, respelt_core::em_width::<WebDom>)
}

#[wasm_bindgen(js_name = emHeight)]
pub fn em_height(elt: &JsValue) -> Result<f64, JsValue> {
    measure(elt, respelt_core::em_height::<WebDom>)
}

/// Copy every attribute of `source` onto `destination`.
#[wasm_bindgen(js_name = cloneAttrs)]
pub fn clone_attrs(source: &JsValue, destination: &JsValue) -> Result<(), JsValue> {
    let source = node_arg(source)?;
    let destination = node_arg(destination)?;
    let mut dom = WebDom::new(false).map_err(js_error)?;
    respelt_core::clone_attrs(&mut dom, &source, &destination).map_err(js_error)
}

/// User-supplied `createElt(old)` callback.
struct JsFactory {
    function: Function,
}

impl CreateElement<WebDom> for JsFactory {
    fn create(&self, _dom: &mut WebDom, old: &Node) -> Result<Node, ResponsiveError> {
        let created = self
            .function
            .call1(&JsValue::UNDEFINED, old)
            .map_err(|err| ResponsiveError::Factory(js_message(&err)))?;
        created
            .dyn_into::<Node>()
            .map_err(|_| ResponsiveError::CreatedNotAnElement)
    }
}

type WebChain = ResponsiveChain<WebDom, JsFactory>;

struct PendingPromise {
    resolve: Function,
    reject: Function,
}

struct ChainCell {
    dom: WebDom,
    chain: WebChain,
    gate: FirstArmGate,
    pending: Option<PendingPromise>,
}

type SharedChain = Rc<RefCell<ChainCell>>;

thread_local! {
    // Chains stay alive here until they reach a terminal state; JS only
    // holds them through `ResponsiveChainHandle`.
    static LIVE_CHAINS: RefCell<HashMap<u64, SharedChain>> = RefCell::new(HashMap::new());
}

fn retain(id: u64, cell: &SharedChain) {
    LIVE_CHAINS.with(|live| {
        live.borrow_mut().insert(id, Rc::clone(cell));
    });
}

fn release(id: u64) {
    LIVE_CHAINS.with(|live| {
        live.borrow_mut().remove(&id);
    });
}

/// Pump from a microtask so no host callback runs the chain re-entrantly.
fn wake_hook(cell: Weak<RefCell<ChainCell>>) -> WakeHook {
    Rc::new(move || {
        let cell = cell.clone();
        wasm_bindgen_futures::spawn_local(async move {
            if let Some(cell) = cell.upgrade() {
                pump_cell(&cell);
            }
        });
    })
}

fn pump_cell(cell: &SharedChain) {
    {
        // Busy only when re-entered from `createElt`; the signals stay queued
        // for the next wake.
        let Ok(mut guard) = cell.try_borrow_mut() else {
            return;
        };
        let ChainCell { dom, chain, .. } = &mut *guard;
        if let Err(err) = chain.pump(dom) {
            console_error(&failure_report(chain.id(), &err));
        }
    }
    settle(cell);
}

/// Resolve or reject the pending `replace` promise when due, and drop the
/// chain from the live set once it is terminal.
fn settle(cell: &SharedChain) {
    let (id, terminal, settlement, pending) = {
        let Ok(mut guard) = cell.try_borrow_mut() else {
            return;
        };
        let ChainCell {
            chain,
            gate,
            pending,
            ..
        } = &mut *guard;
        let settlement = gate.poll(chain.state(), chain.last_error());
        let pending = if settlement.is_some() {
            pending.take()
        } else {
            None
        };
        (
            chain.id().get(),
            chain.state().is_terminal(),
            settlement,
            pending,
        )
    };

    if let (Some(settlement), Some(pending)) = (settlement, pending) {
        match settlement {
            Settlement::Resolve => {
                let handle = ResponsiveChainHandle {
                    cell: Rc::clone(cell),
                };
                let _ = pending
                    .resolve
                    .call1(&JsValue::UNDEFINED, &JsValue::from(handle));
            }
            Settlement::Reject(err) => {
                let _ = pending.reject.call1(&JsValue::UNDEFINED, &js_error(err));
            }
        }
    }
    if terminal {
        release(id);
    }
}

fn start_chain(
    adapter: &ResponsiveElt<JsFactory>,
    debug: bool,
    elt: &JsValue,
    resolve: Function,
    reject: Function,
) {
    let node = match node_arg(elt) {
        Ok(node) => node,
        Err(err) => {
            let _ = reject.call1(&JsValue::UNDEFINED, &err);
            return;
        }
    };
    let dom = match WebDom::new(debug) {
        Ok(dom) => dom,
        Err(err) => {
            let _ = reject.call1(&JsValue::UNDEFINED, &js_error(err));
            return;
        }
    };

    let cell: SharedChain = Rc::new(RefCell::new(ChainCell {
        dom,
        chain: adapter.chain::<WebDom>(),
        gate: FirstArmGate::default(),
        pending: Some(PendingPromise { resolve, reject }),
    }));
    let id = {
        let mut guard = cell.borrow_mut();
        let hook = wake_hook(Rc::downgrade(&cell));
        let ChainCell { dom, chain, .. } = &mut *guard;
        chain.set_wake_hook(hook);
        // A failed start leaves the chain `Failed`; `settle` rejects with it.
        let _ = chain.start(dom, &node);
        chain.id().get()
    };
    retain(id, &cell);
    settle(&cell);
}

/// State behind the function returned by `responsiveElt`.
struct WebResponsiveElt {
    adapter: ResponsiveElt<JsFactory>,
    debug: bool,
}

impl WebResponsiveElt {
    fn replace(&self, elt: JsValue) -> Promise {
        let adapter = self.adapter.clone();
        let debug = self.debug;
        Promise::new(&mut |resolve, reject| {
            start_chain(&adapter, debug, &elt, resolve, reject);
        })
    }
}

/// Wrap `createElt` into a responsive element adapter.
///
/// The adapter is a function: `responsiveElt(createElt)(elt)` replaces `elt`
/// with `createElt(elt)` and keeps replacing the result whenever its size
/// changes. The same function is also reachable as `.replace(elt)`.
///
/// The returned promise resolves with a `ResponsiveChainHandle` once the
/// first substitute is observed (after its image settled, for `<img>`
/// substitutes). It rejects when `elt` is not an element, is not in the
/// document, or `createElt` does not return an element.
///
/// `options` may set `claimAttribute` (string, or `false` to disable the
/// double-start check), `maxGenerations`, `sizeEpsilon`,
/// `transitionLogCapacity`, and `debug`.
#[wasm_bindgen(js_name = responsiveElt)]
pub fn responsive_elt(create_elt: JsValue, options: JsValue) -> Result<Function, JsValue> {
    install_panic_hook();
    let function = create_elt
        .dyn_into::<Function>()
        .map_err(|_| js_error(ResponsiveError::NotInvocable))?;

    let options = if options.is_undefined() || options.is_null() {
        ChainOptions::default()
    } else if options.is_object() {
        let json = js_sys::JSON::stringify(&options)?;
        ChainOptions::from_json(&String::from(json)).map_err(js_error)?
    } else {
        return Err(js_error(OptionsError::NotAnObject));
    };
    let config = options.to_config().map_err(js_error)?;
    let adapter =
        respelt_core::responsive_elt_with_config(JsFactory { function }, config).map_err(js_error)?;
    let elt = WebResponsiveElt {
        adapter,
        debug: options.debug,
    };

    let replace = Closure::<dyn FnMut(JsValue) -> Promise>::new(move |target: JsValue| {
        elt.replace(target)
    });
    let callable: Function = replace.into_js_value().unchecked_into();
    Reflect::set(&callable, &"replace".into(), &callable)?;
    Ok(callable)
}

/// Live view of one responsive chain.
#[wasm_bindgen]
pub struct ResponsiveChainHandle {
    cell: SharedChain,
}

impl ResponsiveChainHandle {
    fn with_cell<R>(&self, read: impl FnOnce(&ChainCell) -> R) -> Result<R, JsValue> {
        let guard = self
            .cell
            .try_borrow()
            .map_err(|_| js_error("responsive chain is busy"))?;
        Ok(read(&guard))
    }
}

#[wasm_bindgen]
impl ResponsiveChainHandle {
    /// `idle`, `awaiting_image_load`, `observing`, `stopped`, `orphaned`, or
    /// `failed`.
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> Result<String, JsValue> {
        self.with_cell(|cell| cell.chain.state().as_str().to_owned())
    }

    /// Substitutions performed so far.
    #[wasm_bindgen(getter)]
    pub fn generation(&self) -> Result<f64, JsValue> {
        self.with_cell(|cell| cell.chain.generation() as f64)
    }

    #[wasm_bindgen(getter, js_name = chainId)]
    pub fn chain_id(&self) -> Result<f64, JsValue> {
        self.with_cell(|cell| cell.chain.id().get() as f64)
    }

    /// The element the chain currently owns.
    #[wasm_bindgen(getter)]
    pub fn current(&self) -> Result<Option<Node>, JsValue> {
        self.with_cell(|cell| cell.chain.current().cloned())
    }

    /// Resize observers the chain's host still holds.
    #[wasm_bindgen(getter, js_name = observerCount)]
    pub fn observer_count(&self) -> Result<f64, JsValue> {
        self.with_cell(|cell| cell.dom.observer_count() as f64)
    }

    #[wasm_bindgen(getter, js_name = lastError)]
    pub fn last_error(&self) -> Result<Option<String>, JsValue> {
        self.with_cell(|cell| cell.chain.last_error().map(ToString::to_string))
    }

    /// Disconnect the observer, drop any image wait, and release the claim.
    pub fn stop(&self) -> Result<String, JsValue> {
        let state = {
            let mut guard = self
                .cell
                .try_borrow_mut()
                .map_err(|_| js_error("responsive chain is busy"))?;
            let ChainCell { dom, chain, .. } = &mut *guard;
            chain.stop(dom).to_state
        };
        settle(&self.cell);
        Ok(state.as_str().to_owned())
    }

    /// Drain the transition log as JSONL lines.
    #[wasm_bindgen(js_name = drainTransitionJsonl)]
    pub fn drain_transition_jsonl(&self, run_id: &str) -> Result<Array, JsValue> {
        let mut guard = self
            .cell
            .try_borrow_mut()
            .map_err(|_| js_error("responsive chain is busy"))?;
        Ok(guard
            .chain
            .drain_transition_jsonl(run_id)
            .into_iter()
            .map(|line| JsValue::from_str(&line))
            .collect())
    }

    #[wasm_bindgen(js_name = isTerminal)]
    pub fn is_terminal(&self) -> Result<bool, JsValue> {
        self.with_cell(|cell| cell.chain.state().is_terminal())
    }
}
