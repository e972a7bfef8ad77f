//! Frontend for the pyCircuit compiler: parses the textual IR into a
//! [`pyc_ir::Module`]. The accepted grammar is exactly the output of
//! [`pyc_ir::Printer`].

mod lexer;
mod parser;

pub use parser::parse_module;

#[cfg(test)]
mod tests {
    use super::*;
    use pyc_ir::{OpKind, Printer};

    const COUNTER: &str = r#"
        // 8-bit up-counter.
        module attributes {pyc.top = @counter} {
          func @counter(%clk: w1, %rst: w1) -> (count: w8) {
            %one = const 1 : w8
            %en = const 1 : w1
            %next = add %q, %one : w8
            %q = reg %next clk=%clk rst=%rst en=%en init=0 : w8
            output count = %q
          }
        }
    "#;

    #[test]
    fn parses_counter() {
        let module = parse_module(COUNTER).unwrap();
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.top_symbol().unwrap(), "counter");
        let func = &module.functions[0];
        assert_eq!(func.input_ports().count(), 2);
        assert_eq!(func.outputs.len(), 1);
        let regs = func
            .iter_ops()
            .filter(|(_, op)| matches!(op.kind, OpKind::Reg { .. }))
            .count();
        assert_eq!(regs, 1);
    }

    #[test]
    fn forward_reference_through_register() {
        // `%next` reads `%q` before `%q` is defined; a register closes the
        // loop, so this must parse.
        let module = parse_module(COUNTER).unwrap();
        let func = &module.functions[0];
        let (_, reg) = func
            .iter_ops()
            .find(|(_, op)| matches!(op.kind, OpKind::Reg { .. }))
            .unwrap();
        assert_eq!(func.value_width(reg.operands[3]), 8);
    }

    #[test]
    fn print_parse_round_trip() {
        let module = parse_module(COUNTER).unwrap();
        let printed = Printer::module_to_string(&module);
        let reparsed = parse_module(&printed).unwrap();
        assert_eq!(Printer::module_to_string(&reparsed), printed);
    }

    #[test]
    fn rejects_width_mismatch() {
        let src = r#"
            module {
              func @bad(%a: w8, %b: w4) -> (o: w8) {
                %x = add %a, %b : w8
                output o = %x
              }
            }
        "#;
        assert!(parse_module(src).is_err());
    }

    #[test]
    fn rejects_duplicate_definition() {
        let src = r#"
            module {
              func @bad(%a: w8) -> (o: w8) {
                %x = wire %a : w8
                %x = wire %a : w8
                output o = %x
              }
            }
        "#;
        assert!(parse_module(src).is_err());
    }

    #[test]
    fn parses_structured_control() {
        let src = r#"
            module {
              func @sel(%c: w1, %a: w8, %b: w8) -> (o: w8) {
                %r = if %c : w8 {
                  yield %a
                } else {
                  yield %b
                }
                output o = %r
              }
            }
        "#;
        let module = parse_module(src).unwrap();
        let func = &module.functions[0];
        assert!(func
            .iter_ops()
            .any(|(_, op)| matches!(op.kind, OpKind::If { .. })));
    }

    #[test]
    fn parses_fifo_and_instance() {
        let src = r#"
            module attributes {pyc.top = @top} {
              func @queue(%clk: w1, %rst: w1, %pv: w1, %pd: w8, %pr: w1)
                  -> (data: w8, valid: w1, ready: w1) {
                %d, %v, %r = fifo clk=%clk rst=%rst push_valid=%pv push_data=%pd pop_ready=%pr depth=4 : w8
                output data = %d
                output valid = %v
                output ready = %r
              }
              func @top(%clk: w1, %rst: w1, %pv: w1, %pd: w8, %pr: w1) -> (data: w8) {
                %d, %v, %r = instance @queue(%clk, %rst, %pv, %pd, %pr) : (w8, w1, w1)
                output data = %d
              }
            }
        "#;
        let module = parse_module(src).unwrap();
        assert_eq!(module.functions.len(), 2);
        let top = module.get_function("top".into()).unwrap();
        assert!(top
            .iter_ops()
            .any(|(_, op)| matches!(op.kind, OpKind::Instance)));
    }
}
