pub mod amount;
pub mod order_instruction;
