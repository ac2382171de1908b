//! JSON description of a unit's interface.
//!
//! [`JsonSurface`] builds the document while the parameter walk is replayed
//! into it:
//!
//! ```json
//! {
//!   "name": "organ",
//!   "inputs": 0,
//!   "outputs": 2,
//!   "meta": [ { "nvoices": "8" } ],
//!   "ui": [
//!     { "type": "vgroup", "label": "organ", "items": [
//!       { "type": "hslider", "label": "volume", "address": "/organ/volume",
//!         "index": 3, "meta": [ { "midi": "ctrl 7" } ],
//!         "init": 0.7, "min": 0, "max": 1, "step": 0.01 }
//!     ] }
//!   ]
//! }
//! ```

use polyvox_core::{ControlKind, ControlSurface, GroupKind, ParamDescriptor, ParamTable, UnitMetadata};
use serde_json::{Map, Value, json};

struct Frame {
    group: Map<String, Value>,
    items: Vec<Value>,
}

/// Control surface that renders the walk as JSON.
pub struct JsonSurface {
    header: Map<String, Value>,
    stack: Vec<Frame>,
    root: Vec<Value>,
    pending: Vec<(String, String)>,
}

fn meta_array(entries: &[(String, String)]) -> Value {
    Value::Array(
        entries
            .iter()
            .map(|(k, v)| {
                let mut m = Map::new();
                m.insert(k.clone(), Value::String(v.clone()));
                Value::Object(m)
            })
            .collect(),
    )
}

impl JsonSurface {
    /// Starts a document for a unit named `name`.
    ///
    /// A `name` entry in `metadata` takes precedence over the argument.
    pub fn new(name: &str, inputs: usize, outputs: usize, metadata: &UnitMetadata) -> Self {
        let mut header = Map::new();
        header.insert(
            "name".into(),
            Value::String(metadata.get("name").unwrap_or(name).to_string()),
        );
        header.insert("inputs".into(), json!(inputs));
        header.insert("outputs".into(), json!(outputs));
        if let Some(options) = metadata.get("compile_options") {
            header.insert("compile_options".into(), Value::String(options.to_string()));
        }
        header.insert("meta".into(), meta_array(metadata.entries()));
        Self {
            header,
            stack: Vec::new(),
            root: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn push_item(&mut self, item: Value) {
        match self.stack.last_mut() {
            Some(frame) => frame.items.push(item),
            None => self.root.push(item),
        }
    }

    fn take_meta(&mut self, object: &mut Map<String, Value>) {
        if !self.pending.is_empty() {
            object.insert("meta".into(), meta_array(&self.pending));
            self.pending.clear();
        }
    }

    /// Finishes the document. Groups left open are closed.
    pub fn into_value(mut self) -> Value {
        while !self.stack.is_empty() {
            self.close_group();
        }
        let mut doc = self.header;
        doc.insert("ui".into(), Value::Array(self.root));
        Value::Object(doc)
    }
}

impl ControlSurface for JsonSurface {
    fn open_group(&mut self, kind: GroupKind, label: &str) {
        let mut group = Map::new();
        group.insert("type".into(), Value::String(kind.type_name().into()));
        group.insert("label".into(), Value::String(label.into()));
        self.take_meta(&mut group);
        self.stack.push(Frame {
            group,
            items: Vec::new(),
        });
    }

    fn close_group(&mut self) {
        if let Some(Frame { mut group, items }) = self.stack.pop() {
            group.insert("items".into(), Value::Array(items));
            self.push_item(Value::Object(group));
        }
    }

    fn add_control(&mut self, label: &str, param: &ParamDescriptor) {
        let mut item = Map::new();
        item.insert("type".into(), Value::String(param.kind.type_name().into()));
        item.insert("label".into(), Value::String(label.into()));
        item.insert("address".into(), Value::String(param.path.clone()));
        item.insert("index".into(), json!(param.id.0));
        self.take_meta(&mut item);
        let r = param.range;
        match param.kind {
            ControlKind::Button | ControlKind::CheckButton => {}
            ControlKind::HorizontalBargraph | ControlKind::VerticalBargraph => {
                item.insert("min".into(), json!(r.min));
                item.insert("max".into(), json!(r.max));
            }
            _ => {
                item.insert("init".into(), json!(r.init));
                item.insert("min".into(), json!(r.min));
                item.insert("max".into(), json!(r.max));
                item.insert("step".into(), json!(r.step));
            }
        }
        self.push_item(Value::Object(item));
    }

    fn add_soundfile(&mut self, label: &str, url: &str) {
        let mut item = Map::new();
        item.insert("type".into(), Value::String("soundfile".into()));
        item.insert("label".into(), Value::String(label.into()));
        item.insert("url".into(), Value::String(url.into()));
        self.take_meta(&mut item);
        self.push_item(Value::Object(item));
    }

    fn annotate(&mut self, key: &str, value: &str) {
        self.pending.push((key.to_string(), value.to_string()));
    }
}

/// Full interface document for a table, pretty-printed.
pub fn json_ui(
    table: &ParamTable,
    name: &str,
    inputs: usize,
    outputs: usize,
    metadata: &UnitMetadata,
) -> String {
    let mut surface = JsonSurface::new(name, inputs, outputs, metadata);
    table.replay(&mut surface);
    format!("{:#}", surface.into_value())
}

/// Unit metadata as a JSON object, pretty-printed.
pub fn json_meta(metadata: &UnitMetadata) -> String {
    let mut object = Map::new();
    for (k, v) in metadata.entries() {
        object
            .entry(k.clone())
            .or_insert_with(|| Value::String(v.clone()));
    }
    format!("{:#}", Value::Object(object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyvox_core::{DspUnit, ParamRange};

    fn table() -> ParamTable {
        ParamTable::from_walk(|w| {
            w.declare("tooltip", "main");
            w.open_group(GroupKind::Vertical, "synth");
            w.declare("midi", "ctrl 7");
            w.add_control("volume", ControlKind::HorizontalSlider, ParamRange::new(0.5, 0.0, 1.0, 0.01));
            w.add_control("gate", ControlKind::Button, ParamRange::toggle());
            w.add_control("level", ControlKind::VerticalBargraph, ParamRange::meter(-60.0, 0.0));
            w.add_soundfile("sample", "{'kick.wav'}");
            w.close_group();
        })
        .unwrap()
    }

    struct Named;

    impl DspUnit for Named {
        fn num_inputs(&self) -> usize {
            0
        }
        fn num_outputs(&self) -> usize {
            1
        }
        fn init(&mut self, _sample_rate: u32) {}
        fn instance_clear(&mut self) {}
        fn declare_interface(&self, _walker: &mut dyn polyvox_core::InterfaceWalker) {}
        fn declare_metadata(&self, meta: &mut dyn polyvox_core::Meta) {
            meta.declare("name", "synth");
            meta.declare("author", "polyvox");
            meta.declare("compile_options", "-lang rust -single");
        }
        fn set_param(&mut self, _id: polyvox_core::ParamId, _value: f32) {}
        fn param(&self, _id: polyvox_core::ParamId) -> f32 {
            0.0
        }
        fn compute(&mut self, _frames: usize, _inputs: &[&[f32]], _outputs: &mut [&mut [f32]]) {}
    }

    #[test]
    fn document_mirrors_walk() {
        let meta = UnitMetadata::collect(&Named);
        let text = json_ui(&table(), "fallback", 0, 1, &meta);
        let doc: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(doc["name"], "synth");
        assert_eq!(doc["outputs"], 1);
        assert_eq!(doc["compile_options"], "-lang rust -single");

        let group = &doc["ui"][0];
        assert_eq!(group["type"], "vgroup");
        assert_eq!(group["meta"][0]["tooltip"], "main");

        let items = group["items"].as_array().unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0]["address"], "/synth/volume");
        assert_eq!(items[0]["index"], 0);
        assert_eq!(items[0]["meta"][0]["midi"], "ctrl 7");
        assert_eq!(items[0]["step"], json!(0.01f32));
        assert!(items[1].get("init").is_none());
        assert_eq!(items[2]["type"], "vbargraph");
        assert_eq!(items[2]["min"], -60.0);
        assert!(items[2].get("init").is_none());
        assert_eq!(items[3]["type"], "soundfile");
        assert_eq!(items[3]["url"], "{'kick.wav'}");
    }

    #[test]
    fn name_falls_back_to_argument() {
        let doc = JsonSurface::new("organ", 0, 2, &UnitMetadata::default()).into_value();
        assert_eq!(doc["name"], "organ");
        assert_eq!(doc["ui"], json!([]));
        assert!(doc.get("compile_options").is_none());
    }

    #[test]
    fn meta_document_keeps_first_value() {
        let meta = UnitMetadata::collect(&Named);
        let doc: Value = serde_json::from_str(&json_meta(&meta)).unwrap();
        assert_eq!(doc["author"], "polyvox");
        assert_eq!(doc.as_object().unwrap().len(), 3);
    }
}
