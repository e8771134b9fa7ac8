use serde::{Deserialize, Serialize};
use serde_json::json;
use tagjson::formula::Formula;
use tagjson::{DowncastSync, JsonObject, Optional, G};

trait Shape: DowncastSync {
    fn area(&self) -> f64;
}

#[derive(Serialize, Deserialize)]
struct Circle {
    radius: f64,
}

impl Shape for Circle {
    fn area(&self) -> f64 {
        std::f64::consts::PI * self.radius * self.radius
    }
}

#[derive(Serialize, Deserialize)]
struct Rect {
    width: f64,
    height: f64,
}

impl Shape for Rect {
    fn area(&self) -> f64 {
        self.width * self.height
    }
}

#[derive(Serialize, Deserialize)]
struct Drawing {
    #[serde(default, skip_serializing_if = "G::is_undefined")]
    shape: G<dyn Shape>,
    #[serde(default, skip_serializing_if = "Optional::is_undefined")]
    label: Optional<String>,
}

fn main() {
    tagjson::bind!(dyn Shape { "circle" => Circle, "rect" => Rect });

    let input = r#"{"shape": {"type": "rect", "data": {"width": 3, "height": 4}}, "label": null}"#;
    match serde_json::from_str::<Drawing>(input) {
        Ok(drawing) => {
            if let Some(shape) = drawing.shape.value() {
                println!("Decoded a {:?} with area {}", drawing.shape.type_name(), shape.area());
            }
            println!("Label is null: {}", drawing.label.is_null());
        }
        Err(e) => eprintln!("Failed to decode drawing: {e}"),
    }

    let document = JsonObject::from(json!({"order": {"lines": [{"qty": 2}, {"qty": 5}]}}));
    match document.get("$.order.lines.*.qty") {
        Ok(quantities) => println!("Quantities: {}", quantities.value()),
        Err(e) => eprintln!("Bad path: {:?}", miette::Report::new(e)),
    }

    match Formula::parse("SUM({a}, {b}) * 2") {
        Ok(formula) => match formula.evaluate(&json!({"a": 2, "b": 5})) {
            Ok(total) => println!("{formula} = {total}"),
            Err(e) => eprintln!("Evaluation failed: {e}"),
        },
        Err(e) => eprintln!("Failed to parse formula: {:?}", miette::Report::new(e)),
    }
}
