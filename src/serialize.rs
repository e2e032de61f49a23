// The MIT License (MIT)

// Copyright (c) 2015 Rustcc developers

// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:

// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! `serialized()` (spec.md §6): a textual dump of an object's own slots in
//! the `<type> clone do( slot := value ; ... )` shape. Diagnostic only — it
//! is not a round-trippable format, since parsing is out of scope (spec.md
//! §1) and nested objects print by reference rather than recursively.

use crate::object::{ObjRef, Primitive};

pub fn serialized(o: &ObjRef) -> String {
    let type_name = o.tag().map(|t| t.name()).unwrap_or("Object");
    let mut slots = o.slots().live_slots();
    slots.sort_by(|a, b| a.0.cmp(&b.0));

    if slots.is_empty() {
        return format!("{} clone", type_name);
    }

    let mut out = format!("{} clone do(\n", type_name);
    for (name, cell) in slots {
        if let Some(value) = cell.load() {
            out.push_str(&format!("    {} := {}\n", name, describe_value(&value)));
        }
    }
    out.push(')');
    out
}

fn describe_value(v: &ObjRef) -> String {
    match &*v.value() {
        Primitive::None => format!("Object_{:#x}", v.id()),
        Primitive::Number(n) => n.to_string(),
        Primitive::Str(s) => format!("{:?}", s),
        Primitive::Bool(b) => b.to_string(),
        Primitive::List(items) => format!("List(len={})", items.len()),
        Primitive::Map(entries) => format!("Map(len={})", entries.len()),
        Primitive::Block(b) => format!("Block({} arg(s))", b.arg_names.len()),
        Primitive::Message(m) => format!("Message({})", m.text),
        Primitive::Coroutine(_) => "Coroutine".to_string(),
        Primitive::Future(_) => "Future".to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::object::Object;

    #[test]
    fn test_serialized_empty_object() {
        let o = Object::new_plain();
        assert_eq!(serialized(&o), "Object clone");
    }

    #[test]
    fn test_serialized_lists_slots_sorted() {
        let o = Object::new_plain();
        o.bind_slot("b", Object::new_plain(), 1);
        o.bind_slot("a", Object::new_plain(), 1);
        let out = serialized(&o);
        let a_pos = out.find("a :=").unwrap();
        let b_pos = out.find("b :=").unwrap();
        assert!(a_pos < b_pos);
    }

    #[test]
    fn test_serialized_describes_number_slot() {
        let o = Object::new_plain();
        let n = Object::new_tagged(
            crate::object::tag::BasicTag::new("Number"),
            Primitive::Number(42.0),
            vec![],
        );
        o.bind_slot("answer", n, 1);
        let out = serialized(&o);
        assert!(out.contains("answer := 42"));
    }
}
