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

//! The `OperatorTable` (spec.md §6) and the precedence-shuffle pass
//! (spec.md §4.5) that turns a flat, as-parsed message chain into one where
//! binary operators have absorbed their operands as real message args.
//!
//! The grammar that produces the flat chain in the first place is the
//! parser's job and explicitly out of scope (spec.md §1); `shuffle` takes
//! that flat chain as its only input.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::message::{MessageNode, MessageRef};

const NO_SHUFFLING_PRAGMA: &str = "__noShuffling__";

/// Two maps: operator symbol -> precedence (lower binds tighter), and
/// assignment operator -> the method name it rewrites to.
pub struct OperatorTable {
    operators: Mutex<HashMap<String, i32>>,
    assign_operators: Mutex<HashMap<String, String>>,
}

impl OperatorTable {
    pub fn empty() -> Self {
        OperatorTable {
            operators: Mutex::new(HashMap::new()),
            assign_operators: Mutex::new(HashMap::new()),
        }
    }

    /// The table spec.md §6 lists as the default.
    pub fn default_table() -> Self {
        let table = Self::empty();
        {
            let mut ops = table.operators.lock().unwrap();
            for (sym, prec) in [
                ("@", 0),
                ("@@", 0),
                ("**", 1),
                ("%", 2),
                ("*", 2),
                ("/", 2),
                ("+", 3),
                ("-", 3),
                ("<<", 4),
                (">>", 4),
                ("<=", 5),
                (">=", 5),
                ("<", 5),
                (">", 5),
                ("==", 6),
                ("!=", 6),
                ("&", 7),
                ("^", 8),
                ("|", 9),
                ("&&", 10),
                ("and", 10),
                ("||", 11),
                ("or", 11),
                ("..", 12),
                ("?", 13),
            ] {
                ops.insert(sym.to_string(), prec);
            }
        }
        {
            let mut assigns = table.assign_operators.lock().unwrap();
            assigns.insert(":=".to_string(), "setSlot".to_string());
            assigns.insert("=".to_string(), "updateSlot".to_string());
            assigns.insert("::=".to_string(), "newSlot".to_string());
        }
        table
    }

    pub fn precedence_of(&self, symbol: &str) -> Option<i32> {
        self.operators.lock().unwrap().get(symbol).copied()
    }

    pub fn assign_method_of(&self, symbol: &str) -> Option<String> {
        self.assign_operators.lock().unwrap().get(symbol).cloned()
    }

    /// "Extensions install new entries by setting slots on the table."
    pub fn install_operator(&self, symbol: impl Into<String>, precedence: i32) {
        self.operators.lock().unwrap().insert(symbol.into(), precedence);
    }

    pub fn install_assign_operator(&self, symbol: impl Into<String>, method: impl Into<String>) {
        self.assign_operators
            .lock()
            .unwrap()
            .insert(symbol.into(), method.into());
    }

    fn is_assign(&self, symbol: &str) -> bool {
        self.assign_operators.lock().unwrap().contains_key(symbol)
    }
}

impl Default for OperatorTable {
    fn default() -> Self {
        Self::default_table()
    }
}

/// Rewrites `root`'s chain in place against `table`, returning the new head.
/// Idempotent: a chain whose head has already been shuffled is returned
/// unchanged.
pub fn shuffle(root: &MessageRef, table: &OperatorTable) -> MessageRef {
    if root.text == NO_SHUFFLING_PRAGMA {
        return root.next().unwrap_or_else(|| MessageNode::new("nil", vec![]));
    }

    let statements = split_statements(root);
    let mut shuffled_statements: Vec<MessageRef> = Vec::with_capacity(statements.len());

    for (tokens, terminator) in statements {
        let head = if tokens.is_empty() {
            MessageNode::new("nil", vec![])
        } else if already_shuffled(&tokens[0]) {
            tokens[0].clone()
        } else {
            shuffle_statement(&tokens, table)
        };
        shuffled_statements.push(head);
        if let Some(term) = terminator {
            shuffled_statements.push(term);
        }
    }

    relink(&shuffled_statements)
}

fn already_shuffled(head: &MessageRef) -> bool {
    head.is_shuffled_marker()
}

fn relink(nodes: &[MessageRef]) -> MessageRef {
    for pair in nodes.windows(2) {
        pair[0].link_next(pair[1].clone());
    }
    nodes[0].clone()
}

/// Splits the flat chain into `(statement_tokens, terminator)` runs.
fn split_statements(root: &MessageRef) -> Vec<(Vec<MessageRef>, Option<MessageRef>)> {
    let mut out = Vec::new();
    let mut current: Vec<MessageRef> = Vec::new();
    let mut cur = Some(root.clone());

    while let Some(node) = cur {
        let next = node.next();
        if node.is_terminator() {
            out.push((std::mem::take(&mut current), Some(node)));
        } else {
            current.push(node);
        }
        cur = next;
    }
    if !current.is_empty() {
        out.push((current, None));
    }
    if out.is_empty() {
        out.push((Vec::new(), None));
    }
    out
}

fn shuffle_statement(tokens: &[MessageRef], table: &OperatorTable) -> MessageRef {
    if tokens.is_empty() {
        return MessageNode::new("nil", vec![]);
    }

    if let Some(pos) = tokens.iter().position(|t| table.is_assign(&t.text)) {
        let lhs = &tokens[..pos];
        let op = &tokens[pos];
        let rhs = &tokens[pos + 1..];

        let method = table
            .assign_method_of(&op.text)
            .unwrap_or_else(|| "setSlot".to_string());
        let name_text = lhs.first().map(|m| m.text.clone()).unwrap_or_default();
        let name_msg = MessageNode::with_position(
            format!("\"{}\"", name_text),
            vec![],
            op.label.clone(),
            op.line,
            op.col,
        );
        let rhs_msg = shuffle_statement(rhs, table);
        let result = MessageNode::with_position(
            method,
            vec![name_msg, rhs_msg],
            op.label.clone(),
            op.line,
            op.col,
        );
        result.mark_shuffled_marker();
        result
    } else {
        let mut i = 0;
        let head = build_level(tokens, &mut i, i32::MAX, table);
        head.mark_shuffled_marker();
        head
    }
}

/// Consumes `tokens[*i..]`, returning a chain whose first node is the
/// operand at `*i` and whose following siblings are operators with
/// precedence `>= ceiling` (i.e. no tighter than the level that called us);
/// any operator tighter than `ceiling` is instead absorbed, recursively, as
/// that operator's single argument.
fn build_level(
    tokens: &[MessageRef],
    i: &mut usize,
    ceiling: i32,
    table: &OperatorTable,
) -> MessageRef {
    let operand = tokens[*i].clone();
    *i += 1;
    let head = operand.clone();
    let mut tail = operand;

    while *i < tokens.len() {
        let op_tok = tokens[*i].clone();
        let prec = match table.precedence_of(&op_tok.text) {
            Some(p) => p,
            None => break,
        };
        if prec >= ceiling {
            break;
        }
        *i += 1;

        if *i >= tokens.len() {
            let op_node = MessageNode::with_position(
                op_tok.text.clone(),
                vec![],
                op_tok.label.clone(),
                op_tok.line,
                op_tok.col,
            );
            tail.link_next(op_node.clone());
            tail = op_node;
            break;
        }

        let arg_chain = build_level(tokens, i, prec, table);
        let op_node = MessageNode::with_position(
            op_tok.text.clone(),
            vec![arg_chain],
            op_tok.label.clone(),
            op_tok.line,
            op_tok.col,
        );
        tail.link_next(op_node.clone());
        tail = op_node;
    }

    head
}

#[cfg(test)]
mod test {
    use super::*;

    fn ident(text: &str) -> MessageRef {
        MessageNode::new(text, vec![])
    }

    fn chain(tokens: Vec<MessageRef>) -> MessageRef {
        for pair in tokens.windows(2) {
            pair[0].link_next(pair[1].clone());
        }
        tokens[0].clone()
    }

    fn describe_shuffled(m: &MessageRef) -> String {
        let mut out = String::new();
        out.push_str(&m.text);
        if !m.args.is_empty() {
            out.push('(');
            for (idx, a) in m.args.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                out.push_str(&describe_shuffled(a));
            }
            out.push(')');
        }
        if let Some(n) = m.next() {
            out.push(' ');
            out.push_str(&describe_shuffled(&n));
        }
        out
    }

    #[test]
    fn test_shuffle_precedence() {
        let table = OperatorTable::default_table();
        let tokens = chain(vec![
            ident("1"),
            ident("+"),
            ident("2"),
            ident("*"),
            ident("3"),
        ]);
        let shuffled = shuffle(&tokens, &table);
        assert_eq!(describe_shuffled(&shuffled), "1 +(2 *(3))");
    }

    #[test]
    fn test_shuffle_is_idempotent() {
        let table = OperatorTable::default_table();
        let tokens = chain(vec![ident("1"), ident("+"), ident("2")]);
        let once = shuffle(&tokens, &table);
        let twice = shuffle(&once, &table);
        assert_eq!(describe_shuffled(&once), describe_shuffled(&twice));
    }

    #[test]
    fn test_assignment_rewrites_to_set_slot() {
        let table = OperatorTable::default_table();
        let tokens = chain(vec![ident("x"), ident(":="), ident("1"), ident("+"), ident("2")]);
        let shuffled = shuffle(&tokens, &table);
        assert_eq!(shuffled.text, "setSlot");
        assert_eq!(shuffled.args[0].text, "\"x\"");
        assert_eq!(describe_shuffled(&shuffled.args[1]), "1 +(2)");
    }

    #[test]
    fn test_no_shuffling_pragma_disables_shuffle() {
        let table = OperatorTable::default_table();
        let tokens = chain(vec![ident("__noShuffling__"), ident("1"), ident("+"), ident("2")]);
        let result = shuffle(&tokens, &table);
        assert_eq!(result.text, "1");
        assert!(result.args.is_empty());
    }
}
