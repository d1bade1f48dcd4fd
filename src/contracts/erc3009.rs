use ethers::prelude::*;

// USDC (FiatTokenV2) view functions used to check a transferWithAuthorization
abigen!(
    Erc3009Token,
    r#"[
        function balanceOf(address account) external view returns (uint256)
        function authorizationState(address authorizer, bytes32 nonce) external view returns (bool)
    ]"#
);
