//! Definitions of Solidity functions called during wiring

use alloy::sol;

sol! {
    function grantRole(bytes32 role, address account) external;
}
