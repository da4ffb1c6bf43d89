//! Graph documents loaded from JSON and serialized back to source.

use exval_core::{load, DocumentError, Heap, Options, Serializer};

fn stringify_document(json: &str) -> Result<String, String> {
    let mut heap = Heap::new();
    let root = load(&mut heap, json).map_err(|e| e.to_string())?;
    Serializer::configure(&heap, Options::default())
        .stringify(&heap, &root)
        .map_err(|e| e.to_string())
}

#[test]
fn point_with_method() {
    let json = r#"{
        "root": {"$ref": "point"},
        "objects": {
            "point": {"properties": {"x": 1, "y": -2.5, "norm": {"$ref": "norm"}}},
            "norm": {"kind": "callable", "source": "function norm() { return Math.sqrt(this.x * this.x + this.y * this.y); }"}
        }
    }"#;
    assert_eq!(
        stringify_document(json).unwrap(),
        "{x:1,y:-2.5,norm:function(){ return Math.sqrt(this.x * this.x + this.y * this.y); }}"
    );
}

#[test]
fn globals_and_special_numbers() {
    let json = r#"{
        "root": {"$ref": "o"},
        "objects": {
            "o": {"properties": {
                "pow": {"$global": "Math.pow"},
                "nan": {"$number": "NaN"},
                "inf": {"$number": "-Infinity"},
                "nothing": {"$undefined": true}
            }}
        }
    }"#;
    assert_eq!(
        stringify_document(json).unwrap(),
        "{pow:Math.pow,nan:NaN,inf:-Infinity,nothing:undefined}"
    );
}

#[test]
fn cyclic_document() {
    let json = r#"{
        "root": {"$ref": "list"},
        "objects": {
            "list": {"kind": "sequence", "items": [{"$ref": "node"}, {"$hole": true}, 3]},
            "node": {"properties": {"owner": {"$ref": "list"}}}
        }
    }"#;
    let out = stringify_document(json).unwrap();
    assert!(out.starts_with("function(){var a=[],b="), "{}", out);
    assert!(out.ends_with("b(a,[{owner:a},,3]);return a}()"), "{}", out);
}

#[test]
fn descriptors_survive_the_round_trip() {
    let json = r#"{
        "root": {"$ref": "o"},
        "objects": {
            "o": {
                "proto": null,
                "properties": {"visible": true},
                "descriptors": {"id": {"value": 7}}
            }
        }
    }"#;
    assert_eq!(
        stringify_document(json).unwrap(),
        "function(a){a.visible=true;return a}(Object.create(null,{id:{value:7}}))"
    );
}

#[test]
fn symbols_in_documents_are_rejected_at_stringify() {
    let json = r#"{"root": {"$symbol": "tag"}}"#;
    let err = stringify_document(json).unwrap_err();
    assert!(err.contains("symbol"), "{}", err);
}

#[test]
fn malformed_documents() {
    let mut heap = Heap::new();
    assert!(matches!(load(&mut heap, "{"), Err(DocumentError::Json(_))));
    assert!(matches!(
        load(&mut heap, r#"{"root": {"$ref": "x"}}"#),
        Err(DocumentError::UnknownObject(id)) if id == "x"
    ));
}
