macro_rules! emit {
    ($cx:expr, $opcode:expr) => {
        $cx.line(format!("    {}", $opcode))
    };

    ($cx:expr, $opcode:expr, $($format:tt)*) => {{
        let operands = format!($($format)*);
        $cx.line(format!("    {:<8}{}", $opcode, operands))
    }};
}
