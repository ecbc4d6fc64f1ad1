//! Concrete generator bodies. Each one emits a small, self-contained
//! piece of code; the control-flow ones recurse into
//! `ProgramBuilder::build_recursive` for their nested bodies.

use super::{CodeGenerator, GeneratorPool};
use crate::builder::{BuilderResult, ProgramBuilder};
use crate::ir::{BinaryOp, CompareOp, Context, JsType, Opcode, UnaryOp, Variable};

pub fn all() -> Vec<CodeGenerator> {
    vec![
        CodeGenerator { name: "IntegerLiteral", required_context: Context::SCRIPT, input_types: vec![], body: integer_literal },
        CodeGenerator { name: "FloatLiteral", required_context: Context::SCRIPT, input_types: vec![], body: float_literal },
        CodeGenerator { name: "StringLiteral", required_context: Context::SCRIPT, input_types: vec![], body: string_literal },
        CodeGenerator { name: "BooleanLiteral", required_context: Context::SCRIPT, input_types: vec![], body: boolean_literal },
        CodeGenerator { name: "BigIntLiteral", required_context: Context::SCRIPT, input_types: vec![], body: bigint_literal },
        CodeGenerator { name: "BuiltinLoad", required_context: Context::SCRIPT, input_types: vec![], body: builtin_load },
        CodeGenerator { name: "ArrayLiteral", required_context: Context::SCRIPT, input_types: vec![], body: array_literal },
        CodeGenerator { name: "ObjectLiteral", required_context: Context::SCRIPT, input_types: vec![], body: object_literal },
        CodeGenerator { name: "PropertyLoad", required_context: Context::SCRIPT, input_types: vec![JsType::anything()], body: property_load },
        CodeGenerator { name: "PropertyStore", required_context: Context::SCRIPT, input_types: vec![JsType::anything(), JsType::anything()], body: property_store },
        CodeGenerator { name: "ElementLoad", required_context: Context::SCRIPT, input_types: vec![JsType::anything()], body: element_load },
        CodeGenerator { name: "ElementStore", required_context: Context::SCRIPT, input_types: vec![JsType::anything(), JsType::anything()], body: element_store },
        CodeGenerator { name: "FunctionCall", required_context: Context::SCRIPT, input_types: vec![JsType::anything()], body: function_call },
        CodeGenerator { name: "MethodCall", required_context: Context::SCRIPT, input_types: vec![JsType::anything()], body: method_call },
        CodeGenerator { name: "ConstructorCall", required_context: Context::SCRIPT, input_types: vec![JsType::anything()], body: constructor_call },
        CodeGenerator { name: "UnaryOperation", required_context: Context::SCRIPT, input_types: vec![JsType::anything()], body: unary_operation },
        CodeGenerator { name: "BinaryOperation", required_context: Context::SCRIPT, input_types: vec![JsType::anything(), JsType::anything()], body: binary_operation },
        CodeGenerator { name: "CompareOperation", required_context: Context::SCRIPT, input_types: vec![JsType::anything(), JsType::anything()], body: compare_operation },
        CodeGenerator { name: "TypeOf", required_context: Context::SCRIPT, input_types: vec![JsType::anything()], body: type_of },
        CodeGenerator { name: "IfElse", required_context: Context::SCRIPT, input_types: vec![JsType::anything()], body: if_else },
        CodeGenerator { name: "WhileLoop", required_context: Context::SCRIPT, input_types: vec![JsType::anything()], body: while_loop },
        CodeGenerator { name: "TryCatch", required_context: Context::SCRIPT, input_types: vec![], body: try_catch },
        CodeGenerator { name: "PlainFunctionDefinition", required_context: Context::SCRIPT, input_types: vec![], body: plain_function_definition },
        CodeGenerator { name: "ReturnStatement", required_context: Context::SUBROUTINE, input_types: vec![JsType::anything()], body: return_statement },
        CodeGenerator { name: "ClassDefinition", required_context: Context::SCRIPT, input_types: vec![], body: class_definition },
    ]
}

fn integer_literal(b: &mut ProgramBuilder<'_>, _inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    let v = b.random_int();
    b.emit(Opcode::LoadInteger(v), vec![])?;
    Ok(())
}

fn float_literal(b: &mut ProgramBuilder<'_>, _inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    let v = b.random_float();
    b.emit(Opcode::LoadFloat(v), vec![])?;
    Ok(())
}

fn string_literal(b: &mut ProgramBuilder<'_>, _inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    let v = b.random_string();
    b.emit(Opcode::LoadString(v), vec![])?;
    Ok(())
}

fn boolean_literal(b: &mut ProgramBuilder<'_>, _inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    let v = b.random_int() % 2 == 0;
    b.emit(Opcode::LoadBoolean(v), vec![])?;
    Ok(())
}

fn bigint_literal(b: &mut ProgramBuilder<'_>, _inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    let v = b.random_bigint();
    b.emit(Opcode::LoadBigInt(v), vec![])?;
    Ok(())
}

fn builtin_load(b: &mut ProgramBuilder<'_>, _inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    let name = b.random_builtin_name();
    b.emit(Opcode::LoadBuiltin(name), vec![])?;
    Ok(())
}

fn array_literal(b: &mut ProgramBuilder<'_>, _inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    let elements = b.random_variables_up_to(3);
    b.emit(Opcode::CreateArray, elements)?;
    Ok(())
}

fn object_literal(b: &mut ProgramBuilder<'_>, _inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    let values = b.random_variables_up_to(3);
    let names: Vec<String> = values.iter().map(|_| b.random_property_name()).collect();
    b.emit(Opcode::CreateObject(names), values)?;
    Ok(())
}

fn property_load(b: &mut ProgramBuilder<'_>, inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    let name = b.random_property_name();
    b.emit(Opcode::GetProperty(name), vec![inputs[0]])?;
    Ok(())
}

fn property_store(b: &mut ProgramBuilder<'_>, inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    let name = b.random_property_name();
    b.emit(Opcode::SetProperty(name), vec![inputs[0], inputs[1]])?;
    Ok(())
}

fn element_load(b: &mut ProgramBuilder<'_>, inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    let index = b.random_int() & 0xf;
    b.emit(Opcode::GetElement(index), vec![inputs[0]])?;
    Ok(())
}

fn element_store(b: &mut ProgramBuilder<'_>, inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    let index = b.random_int() & 0xf;
    b.emit(Opcode::SetElement(index), vec![inputs[0], inputs[1]])?;
    Ok(())
}

fn function_call(b: &mut ProgramBuilder<'_>, inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    let args = b.random_variables_up_to(2);
    let spreads = vec![false; args.len()];
    let mut call_inputs = vec![inputs[0]];
    call_inputs.extend(args);
    b.emit(Opcode::CallFunction { spreads }, call_inputs)?;
    Ok(())
}

fn method_call(b: &mut ProgramBuilder<'_>, inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    let method = b.random_method_name();
    let args = b.random_variables_up_to(2);
    let spreads = vec![false; args.len()];
    let mut call_inputs = vec![inputs[0]];
    call_inputs.extend(args);
    b.emit(Opcode::CallMethod { method, spreads }, call_inputs)?;
    Ok(())
}

fn constructor_call(b: &mut ProgramBuilder<'_>, inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    let args = b.random_variables_up_to(2);
    let spreads = vec![false; args.len()];
    let mut call_inputs = vec![inputs[0]];
    call_inputs.extend(args);
    b.emit(Opcode::Construct { spreads }, call_inputs)?;
    Ok(())
}

fn unary_operation(b: &mut ProgramBuilder<'_>, inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    b.emit(Opcode::UnaryOperation(UnaryOp::Neg), vec![inputs[0]])?;
    Ok(())
}

fn binary_operation(b: &mut ProgramBuilder<'_>, inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    b.emit(Opcode::BinaryOperation(BinaryOp::Add), vec![inputs[0], inputs[1]])?;
    Ok(())
}

fn compare_operation(b: &mut ProgramBuilder<'_>, inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    b.emit(Opcode::CompareOperation(CompareOp::Equal), vec![inputs[0], inputs[1]])?;
    Ok(())
}

fn type_of(b: &mut ProgramBuilder<'_>, inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    b.emit(Opcode::TypeOf, vec![inputs[0]])?;
    Ok(())
}

fn if_else(b: &mut ProgramBuilder<'_>, inputs: &[Variable], pool: &mut GeneratorPool) -> BuilderResult<()> {
    b.emit(Opcode::BeginIf { inverted: false }, vec![inputs[0]])?;
    b.build_recursive(2, pool)?;
    b.emit(Opcode::BeginElse, vec![])?;
    b.build_recursive(2, pool)?;
    b.emit(Opcode::EndIf, vec![])?;
    Ok(())
}

fn while_loop(b: &mut ProgramBuilder<'_>, inputs: &[Variable], pool: &mut GeneratorPool) -> BuilderResult<()> {
    b.emit(Opcode::BeginWhileLoop, vec![inputs[0]])?;
    b.build_recursive(2, pool)?;
    b.emit(Opcode::EndWhileLoop, vec![])?;
    Ok(())
}

fn try_catch(b: &mut ProgramBuilder<'_>, _inputs: &[Variable], pool: &mut GeneratorPool) -> BuilderResult<()> {
    b.emit(Opcode::BeginTry, vec![])?;
    b.build_recursive(2, pool)?;
    b.emit(Opcode::BeginCatch, vec![])?;
    b.build_recursive(2, pool)?;
    b.emit(Opcode::EndTryCatch, vec![])?;
    Ok(())
}

fn plain_function_definition(b: &mut ProgramBuilder<'_>, _inputs: &[Variable], pool: &mut GeneratorPool) -> BuilderResult<()> {
    b.emit(Opcode::BeginFunctionDefinition { num_parameters: 1 }, vec![])?;
    b.build_recursive(3, pool)?;
    b.emit(Opcode::EndFunctionDefinition, vec![])?;
    Ok(())
}

fn return_statement(b: &mut ProgramBuilder<'_>, inputs: &[Variable], _pool: &mut GeneratorPool) -> BuilderResult<()> {
    b.emit(Opcode::Return, vec![inputs[0]])?;
    Ok(())
}

fn class_definition(b: &mut ProgramBuilder<'_>, _inputs: &[Variable], pool: &mut GeneratorPool) -> BuilderResult<()> {
    b.emit(Opcode::BeginClassDefinition { has_superclass: false }, vec![])?;
    let name = b.random_method_name();
    b.emit(Opcode::BeginClassMethod { name, is_static: false }, vec![])?;
    b.build_recursive(2, pool)?;
    b.emit(Opcode::EndClassDefinition, vec![])?;
    Ok(())
}
