//! Functions required by rustc/LLVM

use super::board;

use core::panic::PanicInfo;

/// Required by the compiler.
#[no_mangle]
pub extern "C" fn __aeabi_unwind_cpp_pr0() {}

/// Required by the compiler.
#[no_mangle]
pub extern "C" fn __aeabi_unwind_cpp_pr1() {}

/// Required by modules that haven't been build with panic = "abort"
#[allow(non_snake_case)]
#[no_mangle]
pub extern "C" fn _Unwind_Resume() {}

/// Panics end up blinking the fault LED, same as a fault exception
#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    board::safe();
}
