/// Application constants

// Network
pub const BASE_CHAIN_ID: u64 = 8453;
pub const DEFAULT_RPC_URL: &str = "https://mainnet.base.org";
pub const DEFAULT_GAME_CONTRACT: &str = "0xe06B3465688C57Ef05cC01A724fE3c5Af33aC9b7";
pub const DEFAULT_BACKEND_URL: &str = "https://baserun-backend.vercel.app";

// EIP-712 domain of the jackpot contract
pub const EIP712_DOMAIN_NAME: &str = "GameJackpot";
pub const EIP712_DOMAIN_VERSION: &str = "1";
pub const EIP712_DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
pub const EIP712_WIN_TYPE: &str =
    "Win(address player,uint256 ticketId,uint256 prizeSnapshot,uint256 nonce,uint256 expiresAt)";

// Win attestation
pub const WIN_SIGNATURE_TTL_SECS: i64 = 600;
pub const NONCE_RANDOM_SPAN: u64 = 1_000_000;

// Ticket packs, in wei
pub const PRICE_SINGLE_WEI: u64 = 50_000_000_000_000; // 0.00005 ETH
pub const PRICE_TEN_WEI: u64 = 500_000_000_000_000; // 0.0005 ETH
pub const PRICE_FIFTY_WEI: u64 = 2_500_000_000_000_000; // 0.0025 ETH

// Puzzle
pub const ROW_COUNT: usize = 4;
pub const LETTERS: [char; ROW_COUNT] = ['b', 'a', 's', 'e'];
pub const DEFAULT_ROW_SIZES: [usize; ROW_COUNT] = [2, 3, 4, 5];

// Backend client
pub const BACKEND_LOG_BODY_LIMIT: usize = 200;
pub const BACKEND_ERROR_BODY_LIMIT: usize = 80;

// API version
pub const API_VERSION: &str = "v1";
